use hnsw_rs::prelude::*;

use super::{Neighbor, VectorIndex, check_dimension, sort_neighbors};
use crate::distance::Metric;
use crate::error::{DedupError, Result};

struct DistMetric(Metric);

impl Distance<f32> for DistMetric {
    fn eval(&self, va: &[f32], vb: &[f32]) -> f32 {
        self.0.distance(va, vb)
    }
}

/// 基于 hnsw_rs 的近似最近邻索引
///
/// 每次查询最多返回 `max_neighbors` 个候选，再按阈值过滤，
/// 因此当阈值内的重复图片数量超过 `max_neighbors` 时会丢失部分结果。
pub struct HnswIndex {
    hnsw: Hnsw<'static, f32, DistMetric>,
    dimension: usize,
    metric: Metric,
    max_neighbors: usize,
    ef_search: usize,
    len: usize,
}

impl HnswIndex {
    pub fn new(dimension: usize, metric: Metric, max_neighbors: usize, ef_search: usize) -> Self {
        // 参数参考 faiss 默认值 32 - 40 - 16，适当调高了 ef_construction
        let hnsw = Hnsw::<f32, _>::new(32, 100_000, 16, 128, DistMetric(metric));
        Self {
            hnsw,
            dimension,
            metric,
            max_neighbors: max_neighbors.max(1),
            ef_search: ef_search.max(max_neighbors),
            len: 0,
        }
    }
}

impl VectorIndex for HnswIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn len(&self) -> usize {
        self.len
    }

    fn insert(&mut self, key: u64, vector: &[f32]) -> Result<()> {
        check_dimension(self.dimension, vector)?;
        let id = usize::try_from(key)
            .map_err(|_| DedupError::IndexCorruption(format!("key {key} 超出范围")))?;
        self.hnsw.insert((vector, id));
        self.len += 1;
        Ok(())
    }

    fn search(&self, query: &[f32], threshold: f32) -> Result<Vec<Neighbor>> {
        check_dimension(self.dimension, query)?;
        if self.len == 0 {
            return Ok(vec![]);
        }
        let mut neighbors = self
            .hnsw
            .search(query, self.max_neighbors, self.ef_search)
            .into_iter()
            .filter(|n| n.distance <= threshold)
            .map(|n| Neighbor { key: n.d_id as u64, distance: n.distance })
            .collect::<Vec<_>>();
        sort_neighbors(&mut neighbors);
        Ok(neighbors)
    }
}
