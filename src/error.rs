use serde_json::Error as JsonError;
use std::{io::Error as IoError, path::PathBuf};
use thiserror::Error;

/// 请求体构建错误类型
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PayloadErrorKind {
    /// 不支持的输入类型，属于调用方的编程错误，重试无意义
    UnsupportedInput,

    /// 本地 IO 失败，修正文件路径后可重试
    LocalIOError,

    /// 序列化失败，需要修改输入后才能重试
    SerializationError,
}

/// 请求体构建错误
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PayloadError {
    /// 不支持的请求体类型
    #[error("unsupported payload type: {type_name}")]
    UnsupportedPayloadType {
        /// 输入值的类型名称
        type_name: &'static str,
    },

    /// 无法转换为表单的类型
    #[error("unable to convert type {type_name} to form values")]
    UnsupportedFormShape {
        /// 输入值的类型名称
        type_name: &'static str,
    },

    /// 文件打开失败
    #[error("failed to open file {}: {source}", path.display())]
    FileOpenError {
        /// 文件路径
        path: PathBuf,
        /// 原始 IO 错误
        source: IoError,
    },

    /// Multipart 上传文件读取失败
    #[error("failed to read upload file {}: {source}", path.display())]
    UploadFileError {
        /// 上传文件路径
        path: PathBuf,
        /// 原始 IO 错误
        source: IoError,
    },

    /// JSON 序列化失败
    #[error("JSON serialize error: {0}")]
    SerializationError(#[from] JsonError),

    /// 非法的 Multipart 分隔符
    #[error("invalid multipart boundary: {boundary:?}")]
    InvalidBoundary {
        /// 指定的分隔符
        boundary: String,
    },
}

impl PayloadError {
    /// 获取错误类型
    #[inline]
    pub fn kind(&self) -> PayloadErrorKind {
        match self {
            Self::UnsupportedPayloadType { .. } | Self::UnsupportedFormShape { .. } | Self::InvalidBoundary { .. } => {
                PayloadErrorKind::UnsupportedInput
            }
            Self::FileOpenError { .. } | Self::UploadFileError { .. } => PayloadErrorKind::LocalIOError,
            Self::SerializationError(_) => PayloadErrorKind::SerializationError,
        }
    }

    /// 获取底层 IO 错误，仅文件相关的错误才有
    #[inline]
    pub fn io_error(&self) -> Option<&IoError> {
        match self {
            Self::FileOpenError { source, .. } | Self::UploadFileError { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// 请求体构建结果
pub type PayloadResult<T> = Result<T, PayloadError>;
