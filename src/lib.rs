#![deny(unsafe_code)]

//! # qiniu-payload
//!
//! ## 七牛 HTTP 请求体构建库
//!
//! 将字符串、内存数据、输入流、文件、结构化数据、表单或 Multipart 上传文件统一构建为
//! [`Payload`]，即一个只能读取一次的数据流加上可选的 MIME 类型，交给 HTTP 客户端发送。
//!
//! ### 发送 Multipart 表单代码实例
//!
//! ```
//! use qiniu_payload::{FormValues, Payload, UploadFile};
//! use std::io::Read;
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut form = FormValues::new();
//! form.set("token", "fake-upload-token").set("key", "test-key");
//!
//! let mut payload = Payload::multipart(&[UploadFile::new("file", "/tmp/fakefilename.bin")], Some(form))?;
//! let content_type = payload.content_type().map(|mime| mime.to_string());
//! let mut body = Vec::new();
//! payload.read_to_end(&mut body)?;
//! # Ok(())
//! # }
//! ```

mod error;
mod form;
mod multipart;
mod payload;
mod record;
mod source;

pub use error::{PayloadError, PayloadErrorKind, PayloadResult};
pub use form::{FormValues, Iter as FormValuesIter};
pub use multipart::{FieldName, FileName, MultipartOptions, UploadFile};
pub use payload::{Payload, PayloadBody};
pub use record::SerializableRecord;
pub use source::{new_payload, PayloadSource};

pub use mime;
