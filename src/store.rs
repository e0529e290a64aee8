use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::error::{DedupError, Result};

/// 图片记录，创建后不可修改
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// 图片 ID（UUID）
    pub id: String,
    /// 全局插入序号，从 1 开始
    pub seq: u64,
    /// 系统分配的图片名称
    pub name: String,
    /// 原始文件名
    pub original_name: Option<String>,
    /// 所属请求 ID
    pub request_id: String,
    /// 图片 blake3 哈希
    pub hash: String,
    /// 特征向量
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// 系统分配的图片名称
pub fn assigned_name(seq: u64) -> String {
    format!("image_{seq}")
}

/// 内存中的图片记录存储
///
/// 只支持追加，按插入序号有序保存
#[derive(Default)]
pub struct RecordStore {
    records: BTreeMap<u64, ImageRecord>,
    ids: HashMap<String, u64>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, record: ImageRecord) {
        self.ids.insert(record.id.clone(), record.seq);
        self.records.insert(record.seq, record);
    }

    pub fn get(&self, id: &str) -> Result<&ImageRecord> {
        self.ids
            .get(id)
            .and_then(|seq| self.records.get(seq))
            .ok_or_else(|| DedupError::ImageNotFound(id.to_owned()))
    }

    /// 根据插入序号获取记录
    pub fn get_by_seq(&self, seq: u64) -> Option<&ImageRecord> {
        self.records.get(&seq)
    }

    /// 按 ID 列表的顺序取出记录
    ///
    /// 请求中登记的图片必然存在于存储中，缺失即视为索引损坏
    pub fn get_many(&self, ids: &[String]) -> Result<Vec<ImageRecord>> {
        ids.iter()
            .map(|id| {
                self.get(id).cloned().map_err(|_| {
                    DedupError::IndexCorruption(format!("请求中的图片 {id} 不在存储中"))
                })
            })
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 按插入顺序遍历所有记录
    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> + '_ {
        self.records.values()
    }
}
