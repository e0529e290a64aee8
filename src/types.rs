use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::distance::Metric;
use crate::error::{DedupError, ErrorKind};
use crate::index::IndexKind;
use crate::resolver::Scope;
use crate::store::ImageRecord;

/// 待添加的图片
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// 原始文件名
    pub name: Option<String>,
    /// 图片原始字节
    pub data: Vec<u8>,
}

impl ImageInput {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { name: None, data: data.into() }
    }

    pub fn with_name(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self { name: Some(name.into()), data: data.into() }
    }
}

/// 添加图片的结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestResponse {
    pub request_id: String,
    /// 每张图片的处理结果，顺序与输入一致
    pub results: Vec<IngestResult>,
}

impl IngestResponse {
    /// 成功添加的图片数量
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestResult {
    pub input_index: usize,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl IngestResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success { image_id: String, assigned_name: String },
    Failure { error: ErrorInfo },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&DedupError> for ErrorInfo {
    fn from(err: &DedupError) -> Self {
        Self { kind: err.kind(), message: err.to_string() }
    }
}

/// 重复图片查询结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DuplicatesResponse {
    pub request_id: String,
    pub images: Vec<ImageDuplicates>,
}

impl DuplicatesResponse {
    /// 是否没有找到任何重复图片
    pub fn is_empty(&self) -> bool {
        self.images.iter().all(|image| image.duplicates.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImageDuplicates {
    pub image_id: String,
    pub assigned_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    /// 按距离升序排列，距离相同时按添加顺序
    pub duplicates: Vec<DuplicateEntry>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DuplicateEntry {
    pub image_id: String,
    pub assigned_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    pub distance: f32,
}

/// 运行状态统计
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Stats {
    pub images: usize,
    pub requests: usize,
    pub dimension: usize,
    pub metric: Metric,
    pub index: IndexKind,
    pub scope: Scope,
    pub threshold: f32,
}

/// 图片记录的元数据
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImageInfo {
    pub image_id: String,
    pub assigned_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    pub request_id: String,
    pub hash: String,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<ImageRecord> for ImageInfo {
    fn from(record: ImageRecord) -> Self {
        Self {
            image_id: record.id,
            assigned_name: record.name,
            original_name: record.original_name,
            request_id: record.request_id,
            hash: record.hash,
            created_at: record.created_at,
        }
    }
}
