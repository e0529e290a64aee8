mod flat;
mod hnsw;

use std::cmp::Ordering;

use clap::ValueEnum;
use serde::Serialize;
use utoipa::ToSchema;

pub use self::flat::FlatIndex;
pub use self::hnsw::HnswIndex;
use crate::distance::Metric;
use crate::error::{DedupError, Result};

/// 索引中的一个近邻
///
/// `key` 为图片记录的插入序号，同时也作为索引内部的 ID
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub key: u64,
    pub distance: f32,
}

/// 索引类型
#[derive(ValueEnum, Serialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// 精确的线性扫描
    Flat,
    /// HNSW 近似最近邻搜索，召回数量受 max_neighbors 限制
    Hnsw,
}

/// 相似度索引
pub trait VectorIndex: Send + Sync {
    /// 向量维度
    fn dimension(&self) -> usize;

    /// 度量方式
    fn metric(&self) -> Metric;

    /// 索引中的向量数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 添加一条向量，key 必须唯一
    fn insert(&mut self, key: u64, vector: &[f32]) -> Result<()>;

    /// 搜索所有距离不超过 threshold 的向量
    ///
    /// 结果按距离升序排列，距离相同时按 key（插入顺序）升序
    fn search(&self, query: &[f32], threshold: f32) -> Result<Vec<Neighbor>>;

    /// 同 [`VectorIndex::search`]，但排除 key 自身
    fn search_excluding(&self, key: u64, query: &[f32], threshold: f32) -> Result<Vec<Neighbor>> {
        let mut neighbors = self.search(query, threshold)?;
        neighbors.retain(|n| n.key != key);
        Ok(neighbors)
    }
}

/// 根据配置创建索引
pub fn create_index(
    kind: IndexKind,
    dimension: usize,
    metric: Metric,
    max_neighbors: usize,
    ef_search: usize,
) -> Box<dyn VectorIndex> {
    match kind {
        IndexKind::Flat => Box::new(FlatIndex::new(dimension, metric)),
        IndexKind::Hnsw => Box::new(HnswIndex::new(dimension, metric, max_neighbors, ef_search)),
    }
}

pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(DedupError::DimensionMismatch { expected, actual: vector.len() });
    }
    Ok(())
}

/// 距离升序，距离相同时插入顺序升序
pub(crate) fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_unstable_by(|a, b| {
        a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal).then(a.key.cmp(&b.key))
    });
}
