use super::{FormValues, PayloadError, PayloadResult};
use assert_impl::assert_impl;
use http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    request::Builder as RequestBuilder,
    HeaderValue, Request, Result as HttpResult,
};
use log::debug;
use mime::Mime;
use once_cell::sync::Lazy;
use std::{
    borrow::Cow,
    fmt::{self, Debug},
    fs::File,
    io::{Cursor, Read, Result as IoResult, Seek},
    path::Path,
};

pub(super) static APPLICATION_JSON_UTF_8: Lazy<Mime> =
    Lazy::new(|| "application/json; charset=utf-8".parse().unwrap());
pub(super) static APPLICATION_WWW_FORM_URLENCODED_UTF_8: Lazy<Mime> =
    Lazy::new(|| "application/x-www-form-urlencoded; charset=utf-8".parse().unwrap());

enum PayloadBodyInner<'a> {
    Empty,
    Bytes(Cursor<Cow<'a, [u8]>>),
    ReaderRef(&'a mut (dyn Read + Send)),
    Reader(Box<dyn Read + Send + 'a>),
    File(File),
}

impl Debug for PayloadBodyInner<'_> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.debug_tuple("Empty").finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Self::ReaderRef(_) => f.debug_tuple("ReaderRef").finish(),
            Self::Reader(_) => f.debug_tuple("Reader").finish(),
            Self::File(file) => f.debug_tuple("File").field(file).finish(),
        }
    }
}

/// 请求体数据流
///
/// 只能被读取一次，如果持有打开的文件，文件将在数据流被释放时关闭
#[derive(Debug)]
pub struct PayloadBody<'a>(PayloadBodyInner<'a>);

impl PayloadBody<'_> {
    /// 是否为空请求体
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.0, PayloadBodyInner::Empty)
    }

    /// 是否持有需要释放的系统资源
    #[inline]
    pub fn owns_resource(&self) -> bool {
        matches!(self.0, PayloadBodyInner::File(_))
    }

    /// 剩余未读取的数据长度，对于输入流无法得知
    pub fn content_length(&self) -> Option<u64> {
        match &self.0 {
            PayloadBodyInner::Empty => Some(0),
            PayloadBodyInner::Bytes(bytes) => {
                Some((bytes.get_ref().len() as u64).saturating_sub(bytes.position()))
            }
            PayloadBodyInner::File(file) => file_remaining_length(file),
            PayloadBodyInner::ReaderRef(_) | PayloadBodyInner::Reader(_) => None,
        }
    }
}

// 管道和设备没有长度，/proc 下的文件虽是普通文件但长度总为 0，都只能读到结尾
fn file_remaining_length(mut file: &File) -> Option<u64> {
    let metadata = file.metadata().ok()?;
    if !metadata.is_file() || metadata.len() == 0 {
        return None;
    }
    let position = file.stream_position().ok()?;
    Some(metadata.len().saturating_sub(position))
}

impl Read for PayloadBody<'_> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        match &mut self.0 {
            PayloadBodyInner::Empty => Ok(0),
            PayloadBodyInner::Bytes(bytes) => bytes.read(buf),
            PayloadBodyInner::ReaderRef(reader) => reader.read(buf),
            PayloadBodyInner::Reader(reader) => reader.read(buf),
            PayloadBodyInner::File(file) => file.read(buf),
        }
    }
}

/// HTTP 请求体
///
/// 由请求体数据流和可选的 MIME 类型组成，创建后不可修改。
///
/// ### 构建请求体代码实例
///
/// ```
/// use qiniu_payload::{FormValues, Payload};
/// use std::io::Read;
///
/// # fn example() -> anyhow::Result<()> {
/// let mut form = FormValues::new();
/// form.add("key", "test-key").add("tag", "a").add("tag", "b");
///
/// let mut payload = Payload::form(form);
/// assert_eq!(
///     payload.content_type().map(|mime| mime.as_ref()),
///     Some("application/x-www-form-urlencoded; charset=utf-8")
/// );
///
/// let mut body = String::new();
/// payload.read_to_string(&mut body)?;
/// assert_eq!(body, "key=test-key&tag=a&tag=b");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Payload<'a> {
    body: PayloadBody<'a>,
    content_type: Option<Mime>,
}

impl<'a> Payload<'a> {
    #[inline]
    fn new(inner: PayloadBodyInner<'a>, content_type: Option<Mime>) -> Self {
        Self {
            body: PayloadBody(inner),
            content_type,
        }
    }

    /// 空请求体
    ///
    /// 不包含任何数据，也不持有任何资源
    #[inline]
    pub const fn empty() -> Self {
        Self {
            body: PayloadBody(PayloadBodyInner::Empty),
            content_type: None,
        }
    }

    /// 创建字符串请求体
    #[inline]
    pub fn text(value: impl Into<Cow<'a, str>>) -> Self {
        let bytes = match value.into() {
            Cow::Borrowed(str) => Cow::Borrowed(str.as_bytes()),
            Cow::Owned(string) => Cow::Owned(string.into_bytes()),
        };
        debug!("text payload is created, {} bytes", bytes.len());
        Self::new(PayloadBodyInner::Bytes(Cursor::new(bytes)), None)
    }

    /// 创建内存数据请求体
    #[inline]
    pub fn bytes(value: impl Into<Cow<'a, [u8]>>) -> Self {
        let bytes = value.into();
        debug!("bytes payload is created, {} bytes", bytes.len());
        Self::new(PayloadBodyInner::Bytes(Cursor::new(bytes)), None)
    }

    /// 创建输入流请求体
    ///
    /// 输入流不会被缓冲，且所有权仍然属于调用方
    #[inline]
    pub fn stream<R: Read + Send>(reader: &'a mut R) -> Self {
        Self::from_referenced_reader(reader)
    }

    /// 创建输入流请求体，输入流的所有权转移给请求体
    #[inline]
    pub fn reader(reader: impl Read + Send + 'a) -> Self {
        Self::from_boxed_reader(Box::new(reader))
    }

    pub(super) fn from_referenced_reader(reader: &'a mut (dyn Read + Send)) -> Self {
        debug!("referenced stream payload is created");
        Self::new(PayloadBodyInner::ReaderRef(reader), None)
    }

    pub(super) fn from_boxed_reader(reader: Box<dyn Read + Send + 'a>) -> Self {
        debug!("owned stream payload is created");
        Self::new(PayloadBodyInner::Reader(reader), None)
    }

    /// 创建文件请求体
    ///
    /// 打开的文件由请求体持有，MIME 类型根据文件扩展名推断，无法推断时不设置
    pub fn file_path(path: impl AsRef<Path>) -> PayloadResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| PayloadError::FileOpenError {
            path: path.to_owned(),
            source: err,
        })?;
        let content_type = mime_guess::from_path(path).first();
        debug!(
            "file payload is created from {}, content type: {:?}",
            path.display(),
            content_type
        );
        Ok(Self::new(PayloadBodyInner::File(file), content_type))
    }

    /// 创建表单请求体
    pub fn form(form: impl Into<FormValues>) -> Self {
        let body = form.into().encode().into_bytes();
        debug!("form payload is created, {} bytes", body.len());
        Self::new(
            PayloadBodyInner::Bytes(Cursor::new(Cow::Owned(body))),
            Some(APPLICATION_WWW_FORM_URLENCODED_UTF_8.to_owned()),
        )
    }

    pub(super) fn from_buffer(buffer: Vec<u8>, content_type: Mime) -> Self {
        Self::new(PayloadBodyInner::Bytes(Cursor::new(Cow::Owned(buffer))), Some(content_type))
    }

    /// 是否为空请求体
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// 获取请求体的 MIME 类型
    #[inline]
    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    /// 获取剩余未读取的请求体长度，对于输入流和非普通文件无法得知
    #[inline]
    pub fn content_length(&self) -> Option<u64> {
        self.body.content_length()
    }

    /// 是否持有需要释放的系统资源
    #[inline]
    pub fn owns_resource(&self) -> bool {
        self.body.owns_resource()
    }

    /// 获取请求体数据流
    #[inline]
    pub fn body(&self) -> &PayloadBody<'a> {
        &self.body
    }

    /// 拆分为请求体数据流和 MIME 类型
    #[inline]
    pub fn into_parts(self) -> (PayloadBody<'a>, Option<Mime>) {
        (self.body, self.content_type)
    }

    /// 释放请求体持有的资源
    ///
    /// 请求体被丢弃时也会自动释放，该方法仅用于明确释放的时机
    #[inline]
    pub fn release(self) {
        if self.owns_resource() {
            debug!("payload resource is released");
        }
    }

    /// 将请求体设置到 HTTP 请求中
    ///
    /// 如果 MIME 类型存在则设置 `Content-Type`，如果长度可知则设置 `Content-Length`
    pub fn into_request(self, mut builder: RequestBuilder) -> HttpResult<Request<PayloadBody<'a>>> {
        if let Some(content_type) = &self.content_type {
            builder = builder.header(CONTENT_TYPE, HeaderValue::from_str(content_type.as_ref())?);
        }
        if let Some(content_length) = self.content_length() {
            builder = builder.header(CONTENT_LENGTH, content_length);
        }
        builder.body(self.body)
    }
}

impl Default for Payload<'_> {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl Read for Payload<'_> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.body.read(buf)
    }
}

impl Payload<'_> {
    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
    }
}

impl PayloadBody<'_> {
    #[allow(dead_code)]
    fn ignore() {
        assert_impl!(Send: Self);
    }
}
