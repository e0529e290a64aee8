use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use clap::ValueEnum;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{DedupError, Result};
use crate::index::VectorIndex;
use crate::store::{ImageRecord, RecordStore};
use crate::types::{DuplicateEntry, ImageDuplicates};

/// 重复图片的搜索范围
#[derive(ValueEnum, Serialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// 在全部历史图片中搜索
    Corpus,
    /// 只在同一个请求的图片中搜索
    Request,
}

/// 以插入序号为节点的并查集
#[derive(Default)]
pub struct UnionFind {
    nodes: HashMap<u64, usize>,
    keys: Vec<u64>,
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, key: u64) -> usize {
        if let Some(&i) = self.nodes.get(&key) {
            return i;
        }
        let i = self.parent.len();
        self.nodes.insert(key, i);
        self.keys.push(key);
        self.parent.push(i);
        self.rank.push(0);
        i
    }

    fn root(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// 添加一个孤立节点
    pub fn add(&mut self, key: u64) {
        self.node(key);
    }

    pub fn union(&mut self, a: u64, b: u64) {
        let (a, b) = (self.node(a), self.node(b));
        let (ra, rb) = (self.root(a), self.root(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            Ordering::Less => self.parent[ra] = rb,
            Ordering::Greater => self.parent[rb] = ra,
            Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// 返回每个节点所在连通分量的全部成员
    pub fn components(&mut self) -> HashMap<u64, Vec<u64>> {
        let mut groups: HashMap<usize, Vec<u64>> = HashMap::new();
        for i in 0..self.parent.len() {
            let root = self.root(i);
            groups.entry(root).or_default().push(self.keys[i]);
        }
        let mut result = HashMap::with_capacity(self.keys.len());
        for members in groups.into_values() {
            for &key in &members {
                result.insert(key, members.clone());
            }
        }
        result
    }
}

/// 重复图片解析器
///
/// 对请求中的每张图片搜索阈值内的近邻，再通过并查集合并传递关系：
/// A~B 且 B~C 时，即使 A 与 C 的距离超过阈值，三者也属于同一组。
pub struct Resolver<'a> {
    store: &'a RecordStore,
    index: &'a dyn VectorIndex,
    threshold: f32,
    scope: Scope,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a RecordStore,
        index: &'a dyn VectorIndex,
        threshold: f32,
        scope: Scope,
    ) -> Self {
        Self { store, index, threshold, scope }
    }

    /// 解析一组图片的重复关系，结果顺序与输入一致
    pub fn resolve(&self, records: &[ImageRecord]) -> Result<Vec<ImageDuplicates>> {
        let members = records.iter().map(|r| r.seq).collect::<HashSet<_>>();
        let mut uf = UnionFind::new();

        for record in records {
            uf.add(record.seq);
            let neighbors = self.index.search_excluding(record.seq, &record.vector, self.threshold)?;
            for neighbor in neighbors {
                if self.scope == Scope::Request && !members.contains(&neighbor.key) {
                    continue;
                }
                uf.union(record.seq, neighbor.key);
            }
        }

        let components = uf.components();
        records
            .iter()
            .map(|record| {
                let group = components.get(&record.seq).map(Vec::as_slice).unwrap_or_default();
                self.collect_duplicates(record, group)
            })
            .collect()
    }

    fn collect_duplicates(&self, record: &ImageRecord, group: &[u64]) -> Result<ImageDuplicates> {
        let metric = self.index.metric();
        let mut others = group
            .iter()
            .filter(|&&seq| seq != record.seq)
            .map(|&seq| {
                let other = self.store.get_by_seq(seq).ok_or_else(|| {
                    DedupError::IndexCorruption(format!("索引中的向量 {seq} 没有对应的图片记录"))
                })?;
                Ok((metric.distance(&record.vector, &other.vector), other))
            })
            .collect::<Result<Vec<_>>>()?;

        others.sort_unstable_by(|a, b| {
            a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.seq.cmp(&b.1.seq))
        });

        Ok(ImageDuplicates {
            image_id: record.id.clone(),
            assigned_name: record.name.clone(),
            original_name: record.original_name.clone(),
            duplicates: others
                .into_iter()
                .map(|(distance, other)| DuplicateEntry {
                    image_id: other.id.clone(),
                    assigned_name: other.name.clone(),
                    original_name: other.original_name.clone(),
                    distance,
                })
                .collect(),
        })
    }
}
