use super::{FormValues, Payload, PayloadError, PayloadResult};
use log::info;
use mime::{Mime, APPLICATION_OCTET_STREAM};
use once_cell::sync::Lazy;
use rand::random;
use regex::Regex;
use smallstr::SmallString;
use smallvec::SmallVec;
use std::{
    borrow::Borrow,
    fmt,
    ops::Deref,
    path::{Path, PathBuf},
};

mod writer;
use writer::MultipartWriter;

macro_rules! wrap_smallstr {
    ($name:ident) => {
        impl From<String> for $name {
            #[inline]
            fn from(s: String) -> Self {
                Self {
                    inner: SmallString::from(s),
                }
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(s: &str) -> Self {
                Self {
                    inner: SmallString::from(s),
                }
            }
        }

        impl Deref for $name {
            type Target = str;

            #[inline]
            fn deref(&self) -> &Self::Target {
                self.inner.as_str()
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                self.inner.as_str()
            }
        }

        impl Borrow<str> for $name {
            #[inline]
            fn borrow(&self) -> &str {
                self.inner.as_str()
            }
        }

        impl fmt::Debug for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self.inner.as_str(), f)
            }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self.inner.as_str(), f)
            }
        }
    };
}

/// 文件名
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileName {
    inner: SmallString<[u8; 64]>,
}
wrap_smallstr!(FileName);

/// Multipart 字段名称
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldName {
    inner: SmallString<[u8; 16]>,
}
wrap_smallstr!(FieldName);

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Boundary {
    inner: SmallString<[u8; 32]>,
}
wrap_smallstr!(Boundary);

type HeaderBuffer = SmallVec<[u8; 256]>;

/// Multipart 上传文件
///
/// 由表单字段名称和文件路径组成，上传时使用文件路径中的文件名
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    field_name: FieldName,
    path: PathBuf,
}

impl UploadFile {
    /// 创建 Multipart 上传文件
    #[inline]
    pub fn new(field_name: impl Into<FieldName>, path: impl Into<PathBuf>) -> Self {
        Self {
            field_name: field_name.into(),
            path: path.into(),
        }
    }

    /// 获取表单字段名称
    #[inline]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// 获取文件路径
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 获取上传时使用的文件名
    ///
    /// 文件路径没有文件名部分时，使用整个路径
    pub fn file_name(&self) -> FileName {
        match self.path.file_name() {
            Some(file_name) => FileName::from(file_name.to_string_lossy().into_owned()),
            None => FileName::from(self.path.to_string_lossy().into_owned()),
        }
    }
}

/// Multipart 请求体选项
#[derive(Debug, Clone)]
pub struct MultipartOptions {
    boundary: Option<Boundary>,
    guess_file_mime: bool,
}

impl Default for MultipartOptions {
    #[inline]
    fn default() -> Self {
        Self {
            boundary: None,
            guess_file_mime: true,
        }
    }
}

impl MultipartOptions {
    /// 指定 Multipart 分隔符
    ///
    /// 默认每次随机生成，指定的分隔符必须符合 RFC 2046，否则构建请求体时返回
    /// [`PayloadError::InvalidBoundary`]
    #[inline]
    #[must_use]
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(Boundary::from(boundary.into()));
        self
    }

    /// 设置是否根据扩展名推断上传文件的 MIME 类型
    ///
    /// 默认推断，推断失败或不推断时使用 `application/octet-stream`
    #[inline]
    #[must_use]
    pub fn guess_file_mime(mut self, guess_file_mime: bool) -> Self {
        self.guess_file_mime = guess_file_mime;
        self
    }

    fn file_mime(&self, path: &Path) -> Mime {
        if self.guess_file_mime {
            mime_guess::from_path(path).first_or_octet_stream()
        } else {
            APPLICATION_OCTET_STREAM
        }
    }
}

impl Payload<'_> {
    /// 创建 Multipart 请求体
    ///
    /// 按顺序上传所有文件，然后写入表单字段，所有数据都缓冲在内存中，
    /// 任何一个文件无法读取都会导致整个请求体构建失败
    #[inline]
    pub fn multipart(files: &[UploadFile], form: Option<FormValues>) -> PayloadResult<Self> {
        Self::multipart_with_options(files, form, &Default::default())
    }

    /// 使用指定选项创建 Multipart 请求体
    pub fn multipart_with_options(
        files: &[UploadFile],
        form: Option<FormValues>,
        options: &MultipartOptions,
    ) -> PayloadResult<Self> {
        let boundary = options.boundary.to_owned().unwrap_or_else(gen_boundary);
        let content_type = multipart_mime(&boundary)?;

        let mut buffer = Vec::new();
        let mut fields = 0usize;
        let mut writer = MultipartWriter::new(&mut buffer, &boundary);
        for file in files {
            writer.write_file(file, &options.file_mime(file.path()))?;
        }
        if let Some(form) = &form {
            for (name, value) in form.pairs() {
                writer.write_field(name, value);
                fields += 1;
            }
        }
        writer.finish();

        info!(
            "multipart payload is created with {} files and {} fields, {} bytes",
            files.len(),
            fields,
            buffer.len()
        );
        Ok(Self::from_buffer(buffer, content_type))
    }
}

fn gen_boundary() -> Boundary {
    Boundary::from(format!("{:016x}{:016x}", random::<u64>(), random::<u64>()))
}

fn encode_headers(name: &str, file_name: Option<&str>, content_type: Option<&Mime>) -> HeaderBuffer {
    let mut buf = HeaderBuffer::from_slice(b"content-disposition: form-data; ");
    buf.extend_from_slice(format_parameter("name", name).as_bytes());
    if let Some(file_name) = file_name {
        buf.extend_from_slice(b"; ");
        buf.extend_from_slice(format_parameter("filename", file_name).as_bytes());
    }
    if let Some(content_type) = content_type {
        buf.extend_from_slice(b"\r\ncontent-type: ");
        buf.extend_from_slice(content_type.as_ref().as_bytes());
    }
    buf
}

fn format_parameter(name: &str, value: &str) -> String {
    static REGEX: Lazy<Regex> = Lazy::new(|| Regex::new("\\\\|\"|\r|\n").unwrap());
    let mut formatted = String::with_capacity(name.len() + value.len() + 4);
    formatted.push_str(name);
    formatted.push_str("=\"");
    let mut last_match = 0;
    for m in REGEX.find_iter(value) {
        formatted.push_str(&value[last_match..m.start()]);
        match m.as_str() {
            "\\" => formatted.push_str("\\\\"),
            "\"" => formatted.push_str("\\\""),
            "\r" => formatted.push_str("\\\r"),
            "\n" => formatted.push_str("\\\n"),
            _ => unreachable!(),
        }
        last_match = m.end();
    }
    formatted.push_str(&value[last_match..]);
    formatted.push('"');
    formatted
}

// RFC 2046 的 bchars，最长 70 个字符且不能以空格结尾
fn check_boundary(boundary: &Boundary) -> PayloadResult<()> {
    let valid = (1..=70).contains(&boundary.len())
        && !boundary.ends_with(' ')
        && boundary
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"'()+_,-./:=? ".contains(&b));
    if valid {
        Ok(())
    } else {
        Err(PayloadError::InvalidBoundary {
            boundary: boundary.to_string(),
        })
    }
}

fn multipart_mime(boundary: &Boundary) -> PayloadResult<Mime> {
    check_boundary(boundary)?;
    let is_token = boundary
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"'+_-.".contains(&b));
    let content_type = if is_token {
        format!("multipart/form-data; boundary={}", boundary)
    } else {
        format!("multipart/form-data; boundary=\"{}\"", boundary)
    };
    content_type.parse().map_err(|_| PayloadError::InvalidBoundary {
        boundary: boundary.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs::File, io::Read, io::Write};
    use tempfile::tempdir;

    #[test]
    fn test_gen_boundary() {
        env_logger::builder().is_test(true).try_init().ok();

        let boundary = gen_boundary();
        assert_eq!(boundary.len(), 32);
        assert!(boundary.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(gen_boundary(), boundary);
    }

    #[test]
    fn test_header_escaping() {
        env_logger::builder().is_test(true).try_init().ok();

        let name = "start%'\"\r\nßend";
        assert_eq!(
            encode_headers(name, Some(name), Some(&mime::APPLICATION_JSON)).as_ref(),
            "content-disposition: form-data; name=\"start%'\\\"\\\r\\\nßend\"; filename=\"start%'\\\"\\\r\\\nßend\"\r\ncontent-type: application/json".as_bytes()
        );
        assert_eq!(
            encode_headers("first name/a?b#c", None, None).as_ref(),
            b"content-disposition: form-data; name=\"first name/a?b#c\"".as_slice()
        );
        assert_eq!(
            encode_headers("plain", None, None).as_ref(),
            b"content-disposition: form-data; name=\"plain\"".as_slice()
        );
    }

    #[test]
    fn test_upload_file_name() {
        env_logger::builder().is_test(true).try_init().ok();

        let file = UploadFile::new("file", "/tmp/dir/x.txt");
        assert_eq!(file.field_name(), "file");
        assert_eq!(&*file.file_name(), "x.txt");
        assert_eq!(file.path(), Path::new("/tmp/dir/x.txt"));
    }

    #[test]
    fn test_multipart_payload() -> anyhow::Result<()> {
        env_logger::builder().is_test(true).try_init().ok();

        let tempdir = tempdir()?;
        let json_path = tempdir.path().join("fake-file.json");
        File::create(&json_path)?.write_all(b"{\"a\":\"b\"}\n")?;
        let bin_path = tempdir.path().join("fake-file");
        File::create(&bin_path)?.write_all(b"binary")?;

        let mut form = FormValues::new();
        form.add("token", "fake-token").add("tag", "t1").add("tag", "t2");
        let mut payload = Payload::multipart_with_options(
            &[UploadFile::new("file1", &json_path), UploadFile::new("file2", &bin_path)],
            Some(form),
            &MultipartOptions::default().boundary("boundary"),
        )?;
        assert_eq!(
            payload.content_type().map(|mime| mime.as_ref()),
            Some("multipart/form-data; boundary=boundary")
        );
        assert!(!payload.owns_resource());

        const EXPECTED: &str = "--boundary\r\n\
        content-disposition: form-data; name=\"file1\"; filename=\"fake-file.json\"\r\n\
        content-type: application/json\r\n\r\n\
        {\"a\":\"b\"}\n\r\n\
        --boundary\r\n\
        content-disposition: form-data; name=\"file2\"; filename=\"fake-file\"\r\n\
        content-type: application/octet-stream\r\n\r\n\
        binary\r\n\
        --boundary\r\n\
        content-disposition: form-data; name=\"tag\"\r\n\r\n\
        t1\r\n\
        --boundary\r\n\
        content-disposition: form-data; name=\"tag\"\r\n\r\n\
        t2\r\n\
        --boundary\r\n\
        content-disposition: form-data; name=\"token\"\r\n\r\n\
        fake-token\r\n\
        --boundary--\
        \r\n";

        assert_eq!(payload.content_length(), Some(EXPECTED.len() as u64));
        let mut actual = String::new();
        payload.read_to_string(&mut actual)?;
        assert_eq!(EXPECTED, actual);

        tempdir.close()?;
        Ok(())
    }

    #[test]
    fn test_multipart_payload_without_mime_guessing() -> anyhow::Result<()> {
        env_logger::builder().is_test(true).try_init().ok();

        let tempdir = tempdir()?;
        let path = tempdir.path().join("image.png");
        File::create(&path)?.write_all(b"png")?;

        let mut payload = Payload::multipart_with_options(
            &[UploadFile::new("image", &path)],
            None,
            &MultipartOptions::default().boundary("b").guess_file_mime(false),
        )?;
        let mut actual = String::new();
        payload.read_to_string(&mut actual)?;
        assert_eq!(
            actual,
            "--b\r\ncontent-disposition: form-data; name=\"image\"; filename=\"image.png\"\r\n\
             content-type: application/octet-stream\r\n\r\npng\r\n--b--\r\n"
        );
        Ok(())
    }

    #[test]
    fn test_multipart_payload_upload_file_error() -> anyhow::Result<()> {
        env_logger::builder().is_test(true).try_init().ok();

        let tempdir = tempdir()?;
        let exists = tempdir.path().join("exists.txt");
        File::create(&exists)?.write_all(b"hello")?;
        let missing = tempdir.path().join("missing.txt");

        match Payload::multipart(
            &[UploadFile::new("a", &exists), UploadFile::new("b", &missing)],
            None,
        ) {
            Err(PayloadError::UploadFileError { path, source }) => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_multipart_payload_boundary_override() -> anyhow::Result<()> {
        env_logger::builder().is_test(true).try_init().ok();

        match Payload::multipart(&[], None) {
            Ok(payload) => assert!(payload.content_type().is_some()),
            Err(err) => panic!("unexpected error: {}", err),
        }

        let payload = Payload::multipart_with_options(&[], None, &MultipartOptions::default().boundary("a b:c"))?;
        let content_type = payload.content_type().cloned();
        assert_eq!(
            content_type.as_ref().and_then(|mime| mime.get_param(mime::BOUNDARY)).map(|b| b.as_str()),
            Some("a b:c")
        );

        let longest = "x".repeat(70);
        assert!(Payload::multipart_with_options(&[], None, &MultipartOptions::default().boundary(longest)).is_ok());

        let too_long = "x".repeat(71);
        for boundary in ["", "trailing ", "semi;colon", "quote\"", "中文", too_long.as_str()] {
            match Payload::multipart_with_options(&[], None, &MultipartOptions::default().boundary(boundary)) {
                Err(err @ PayloadError::InvalidBoundary { .. }) => {
                    assert_eq!(err.kind(), crate::PayloadErrorKind::UnsupportedInput);
                }
                other => panic!("unexpected result for {:?}: {:?}", boundary, other),
            }
        }
        Ok(())
    }

    #[test]
    fn test_multipart_field_name_is_quoted() -> anyhow::Result<()> {
        env_logger::builder().is_test(true).try_init().ok();

        let mut form = FormValues::new();
        form.add("first name", "Ada").add("say \"hi\"", "hi");
        let mut payload =
            Payload::multipart_with_options(&[], Some(form), &MultipartOptions::default().boundary("b"))?;
        let mut actual = String::new();
        payload.read_to_string(&mut actual)?;
        assert_eq!(
            actual,
            "--b\r\ncontent-disposition: form-data; name=\"first name\"\r\n\r\nAda\r\n\
             --b\r\ncontent-disposition: form-data; name=\"say \\\"hi\\\"\"\r\n\r\nhi\r\n\
             --b--\r\n"
        );
        Ok(())
    }
}
