use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::request::RequestEntry;
use crate::store::{ImageRecord, assigned_name};

/// 请求记录
#[derive(FromRow)]
pub struct RequestRow {
    pub id: String,
    /// 创建时间，毫秒时间戳
    pub created_at: i64,
}

/// 图片记录
#[derive(FromRow)]
pub struct ImageRow {
    /// 全局插入序号
    pub seq: i64,
    /// 图片 ID
    pub id: String,
    pub request_id: String,
    /// 图片在请求中的位置
    pub position: i64,
    pub original_name: Option<String>,
    /// 图片 blake3 哈希
    pub hash: String,
    /// 特征向量，小端序 f32 数组
    pub vector: Vec<u8>,
    pub created_at: i64,
}

pub fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|chunk| f32::from_le_bytes(bytemuck::pod_read_unaligned(chunk))).collect()
}

impl From<RequestRow> for RequestEntry {
    fn from(row: RequestRow) -> Self {
        Self {
            id: row.id,
            images: vec![],
            created_at: from_millis(row.created_at),
            ingesting: false,
        }
    }
}

impl From<ImageRow> for ImageRecord {
    fn from(row: ImageRow) -> Self {
        let seq = row.seq as u64;
        Self {
            id: row.id,
            seq,
            name: assigned_name(seq),
            original_name: row.original_name,
            request_id: row.request_id,
            hash: row.hash,
            vector: decode_vector(&row.vector),
            created_at: from_millis(row.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_blob() {
        let v = vec![0.5, -1.25, 3.0];
        let bytes = encode_vector(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_vector(&bytes), v);
    }
}
