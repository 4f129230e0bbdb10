use super::{FormValues, Payload, PayloadError, PayloadResult, SerializableRecord};
use log::debug;
use std::{
    any::{type_name, Any},
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fmt::{self, Debug},
    fs::File,
    io::Read,
    path::PathBuf,
};

/// 请求体数据源
///
/// 列举了所有可以转换为 [`Payload`] 的输入类型，通过 `From` 或工厂方法构建，
/// 再调用 [`PayloadSource::into_payload`] 得到请求体。
pub enum PayloadSource<'a> {
    /// 无请求体
    Empty,

    /// 已经构建好的请求体，原样返回
    Payload(Payload<'a>),

    /// 字符串
    Text(Cow<'a, str>),

    /// 内存数据
    Bytes(Cow<'a, [u8]>),

    /// 表单
    Form(FormValues),

    /// 输入流的可变引用，所有权仍然属于调用方
    Stream(&'a mut (dyn Read + Send)),

    /// 输入流，所有权转移给请求体
    Reader(Box<dyn Read + Send + 'a>),

    /// 文件路径
    FilePath(PathBuf),

    /// 结构化数据的引用，序列化为 JSON
    Record(&'a dyn SerializableRecord),

    /// 结构化数据，序列化为 JSON
    OwnedRecord(Box<dyn SerializableRecord + 'a>),
}

impl<'a> PayloadSource<'a> {
    /// 使用输入流的可变引用作为数据源
    #[inline]
    pub fn stream<R: Read + Send>(reader: &'a mut R) -> Self {
        Self::Stream(reader)
    }

    /// 使用输入流作为数据源
    #[inline]
    pub fn reader(reader: impl Read + Send + 'a) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// 使用文件作为数据源
    #[inline]
    pub fn file_path(path: impl Into<PathBuf>) -> Self {
        Self::FilePath(path.into())
    }

    /// 使用结构化数据的引用作为数据源
    #[inline]
    pub fn json<T: SerializableRecord>(record: &'a T) -> Self {
        Self::Record(record)
    }

    /// 使用结构化数据作为数据源
    #[inline]
    pub fn json_owned(record: impl SerializableRecord + 'a) -> Self {
        Self::OwnedRecord(Box::new(record))
    }

    /// 构建请求体
    pub fn into_payload(self) -> PayloadResult<Payload<'a>> {
        match self {
            Self::Payload(payload) => Ok(payload),
            Self::Empty => Ok(Payload::empty()),
            Self::Text(text) => Ok(Payload::text(text)),
            Self::Bytes(bytes) => Ok(Payload::bytes(bytes)),
            Self::Form(form) => Ok(Payload::form(form)),
            Self::Stream(reader) => Ok(Payload::from_referenced_reader(reader)),
            Self::Reader(reader) => Ok(Payload::from_boxed_reader(reader)),
            Self::FilePath(path) => Payload::file_path(path),
            Self::Record(record) => Payload::json_record(record),
            Self::OwnedRecord(record) => Payload::json_record(&*record),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Payload(_) => "Payload",
            Self::Text(_) => "Text",
            Self::Bytes(_) => "Bytes",
            Self::Form(_) => "Form",
            Self::Stream(_) => "Stream",
            Self::Reader(_) => "Reader",
            Self::FilePath(_) => "FilePath",
            Self::Record(_) => "Record",
            Self::OwnedRecord(_) => "OwnedRecord",
        }
    }
}

impl PayloadSource<'static> {
    /// 根据运行时类型识别任意值
    ///
    /// 支持类型的 `Option` 形式同样可以识别，`None` 视为无请求体。
    /// 结构化数据无法在运行时识别，需要使用 [`PayloadSource::json`] 或 [`PayloadSource::json_owned`]，
    /// 其他无法识别的类型返回 [`PayloadError::UnsupportedPayloadType`]
    pub fn from_any<T: Any>(value: T) -> PayloadResult<Self> {
        let mut value: Box<dyn Any> = Box::new(value);
        macro_rules! try_downcast {
            ($ty:ty, $convert:expr) => {
                value = match value.downcast::<$ty>() {
                    Ok(v) => return Ok($convert(*v)),
                    Err(value) => value,
                };
            };
        }

        try_downcast!(Payload<'static>, Self::Payload);
        try_downcast!(Self, |source| source);
        try_downcast!((), |_| Self::Empty);
        try_downcast!(String, Self::from);
        try_downcast!(&'static str, Self::from);
        try_downcast!(Vec<u8>, Self::from);
        try_downcast!(&'static [u8], Self::from);
        try_downcast!(HashMap<String, String>, Self::from);
        try_downcast!(HashMap<String, Vec<String>>, Self::from);
        try_downcast!(BTreeMap<String, String>, Self::from);
        try_downcast!(BTreeMap<String, Vec<String>>, Self::from);
        try_downcast!(FormValues, Self::Form);
        try_downcast!(Box<dyn Read + Send>, Self::Reader);
        try_downcast!(File, Self::reader);
        try_downcast!(Option<Payload<'static>>, Self::from);
        try_downcast!(Option<String>, Self::from);
        try_downcast!(Option<&'static str>, Self::from);
        try_downcast!(Option<Vec<u8>>, Self::from);
        try_downcast!(Option<&'static [u8]>, Self::from);
        try_downcast!(Option<FormValues>, Self::from);
        drop(value);

        Err(PayloadError::UnsupportedPayloadType {
            type_name: type_name::<T>(),
        })
    }
}

impl Debug for PayloadSource<'_> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload(payload) => f.debug_tuple("Payload").field(payload).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Self::Form(form) => f.debug_tuple("Form").field(form).finish(),
            Self::FilePath(path) => f.debug_tuple("FilePath").field(path).finish(),
            _ => f.debug_tuple(self.kind()).finish(),
        }
    }
}

impl Default for PayloadSource<'_> {
    #[inline]
    fn default() -> Self {
        Self::Empty
    }
}

impl From<()> for PayloadSource<'_> {
    #[inline]
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl<'a, T: Into<PayloadSource<'a>>> From<Option<T>> for PayloadSource<'a> {
    #[inline]
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

impl<'a> From<Payload<'a>> for PayloadSource<'a> {
    #[inline]
    fn from(payload: Payload<'a>) -> Self {
        Self::Payload(payload)
    }
}

impl<'a> From<&'a str> for PayloadSource<'a> {
    #[inline]
    fn from(text: &'a str) -> Self {
        Self::Text(Cow::Borrowed(text))
    }
}

impl From<String> for PayloadSource<'_> {
    #[inline]
    fn from(text: String) -> Self {
        Self::Text(Cow::Owned(text))
    }
}

impl<'a> From<Cow<'a, str>> for PayloadSource<'a> {
    #[inline]
    fn from(text: Cow<'a, str>) -> Self {
        Self::Text(text)
    }
}

impl<'a> From<&'a [u8]> for PayloadSource<'a> {
    #[inline]
    fn from(bytes: &'a [u8]) -> Self {
        Self::Bytes(Cow::Borrowed(bytes))
    }
}

impl From<Vec<u8>> for PayloadSource<'_> {
    #[inline]
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Cow::Owned(bytes))
    }
}

impl From<FormValues> for PayloadSource<'_> {
    #[inline]
    fn from(form: FormValues) -> Self {
        Self::Form(form)
    }
}

impl From<HashMap<String, String>> for PayloadSource<'_> {
    #[inline]
    fn from(form: HashMap<String, String>) -> Self {
        Self::Form(form.into())
    }
}

impl From<HashMap<String, Vec<String>>> for PayloadSource<'_> {
    #[inline]
    fn from(form: HashMap<String, Vec<String>>) -> Self {
        Self::Form(form.into())
    }
}

impl From<BTreeMap<String, String>> for PayloadSource<'_> {
    #[inline]
    fn from(form: BTreeMap<String, String>) -> Self {
        Self::Form(form.into())
    }
}

impl From<BTreeMap<String, Vec<String>>> for PayloadSource<'_> {
    #[inline]
    fn from(form: BTreeMap<String, Vec<String>>) -> Self {
        Self::Form(form.into())
    }
}

/// 将数据源转换为请求体
///
/// ```
/// use qiniu_payload::{new_payload, PayloadSource};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Object {
///     key: String,
/// }
///
/// # fn example() -> anyhow::Result<()> {
/// assert!(new_payload(None::<String>)?.is_empty());
/// assert!(new_payload("text")?.content_type().is_none());
///
/// let object = Object { key: "fake-key".to_owned() };
/// let payload = new_payload(PayloadSource::json(&object))?;
/// assert_eq!(
///     payload.content_type().map(|mime| mime.as_ref()),
///     Some("application/json; charset=utf-8")
/// );
/// # Ok(())
/// # }
/// ```
#[inline]
pub fn new_payload<'a>(source: impl Into<PayloadSource<'a>>) -> PayloadResult<Payload<'a>> {
    let source = source.into();
    debug!("build payload from {} source", source.kind());
    source.into_payload()
}
