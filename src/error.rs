use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub type Result<T, E = DedupError> = std::result::Result<T, E>;

/// 去重引擎的错误类型
///
/// 单张图片的错误（解码、特征提取、维度不一致等）只会导致该图片失败，
/// 不会中断整个批次；请求级错误会中断当次查询。
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("无法解码图片: {0}")]
    Decode(String),

    #[error("图片大小 {size} 超过上限 {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("特征提取超时（{0} ms）")]
    ExtractionTimeout(u64),

    #[error("特征提取失败: {0}")]
    ExtractionFailure(String),

    #[error("向量维度不一致: 期望 {expected}，实际 {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("请求不存在: {0}")]
    RequestNotFound(String),

    #[error("图片不存在: {0}")]
    ImageNotFound(String),

    #[error("索引损坏: {0}")]
    IndexCorruption(String),

    #[error("数据库错误: {0}")]
    Storage(#[from] sqlx::Error),
}

/// 对外暴露的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum ErrorKind {
    DecodeError,
    TooLarge,
    ExtractionTimeout,
    ExtractionFailure,
    DimensionMismatch,
    RequestNotFound,
    ImageNotFound,
    IndexCorruption,
    Storage,
}

impl DedupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::DecodeError,
            Self::TooLarge { .. } => ErrorKind::TooLarge,
            Self::ExtractionTimeout(_) => ErrorKind::ExtractionTimeout,
            Self::ExtractionFailure(_) => ErrorKind::ExtractionFailure,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::RequestNotFound(_) => ErrorKind::RequestNotFound,
            Self::ImageNotFound(_) => ErrorKind::ImageNotFound,
            Self::IndexCorruption(_) => ErrorKind::IndexCorruption,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// 是否为内部错误（而非用户输入导致的错误）
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::IndexCorruption(_) | Self::Storage(_))
    }
}
