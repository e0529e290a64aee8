use rayon::prelude::*;

use super::{Neighbor, VectorIndex, check_dimension, sort_neighbors};
use crate::distance::Metric;
use crate::error::Result;

/// 超过该数量后使用 rayon 并行扫描
const PAR_SCAN_THRESHOLD: usize = 4096;

/// 暴力搜索索引
///
/// 所有向量连续存放在同一块内存中，查询时逐个计算距离
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    keys: Vec<u64>,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self { dimension, metric, keys: vec![], data: vec![] }
    }

    fn scan(&self, query: &[f32], threshold: f32) -> Vec<Neighbor> {
        let eval = |(&key, v): (&u64, &[f32])| {
            let distance = self.metric.distance(query, v);
            (distance <= threshold).then_some(Neighbor { key, distance })
        };
        if self.keys.len() < PAR_SCAN_THRESHOLD {
            self.keys.iter().zip(self.data.chunks_exact(self.dimension)).filter_map(eval).collect()
        } else {
            self.keys
                .par_iter()
                .zip(self.data.par_chunks_exact(self.dimension))
                .filter_map(eval)
                .collect()
        }
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn insert(&mut self, key: u64, vector: &[f32]) -> Result<()> {
        check_dimension(self.dimension, vector)?;
        self.keys.push(key);
        self.data.extend_from_slice(vector);
        Ok(())
    }

    fn search(&self, query: &[f32], threshold: f32) -> Result<Vec<Neighbor>> {
        check_dimension(self.dimension, query)?;
        let mut neighbors = self.scan(query, threshold);
        sort_neighbors(&mut neighbors);
        Ok(neighbors)
    }
}
