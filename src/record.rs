use super::{payload::APPLICATION_JSON_UTF_8, Payload, PayloadResult};
use log::debug;
use serde::Serialize;
use serde_json::Result as JsonResult;

/// 可序列化的结构化数据
///
/// 所有实现了 [`Serialize`] 的类型都自动实现了该接口
pub trait SerializableRecord {
    /// 序列化为紧凑的 JSON 数据
    fn to_json_vec(&self) -> JsonResult<Vec<u8>>;
}

impl<T: Serialize + ?Sized> SerializableRecord for T {
    #[inline]
    fn to_json_vec(&self) -> JsonResult<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl Payload<'_> {
    /// 创建 JSON 请求体
    ///
    /// MIME 类型固定为 `application/json; charset=utf-8`
    #[inline]
    pub fn json<T: Serialize + ?Sized>(record: &T) -> PayloadResult<Self> {
        Self::json_record(record)
    }

    pub(super) fn json_record<R: SerializableRecord + ?Sized>(record: &R) -> PayloadResult<Self> {
        let body = record.to_json_vec()?;
        debug!("json payload is created, {} bytes", body.len());
        Ok(Self::from_buffer(body, APPLICATION_JSON_UTF_8.to_owned()))
    }
}
