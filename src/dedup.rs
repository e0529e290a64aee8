use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use anyhow::{Context, anyhow};
use chrono::Utc;
use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::{ConfDir, DedupOptions};
use crate::db::{self, Database, crud};
use crate::embed::{Embedder, ThumbnailEmbedder};
use crate::error::{DedupError, Result};
use crate::index::{VectorIndex, check_dimension, create_index};
use crate::metrics;
use crate::request::{RequestEntry, RequestManager};
use crate::resolver::Resolver;
use crate::store::{ImageRecord, RecordStore, assigned_name};
use crate::types::*;
use crate::utils::hash_bytes;

/// 图片记录与相似度索引
///
/// 两者位于同一把锁之下，保证每条记录与索引条目同时可见
pub struct Corpus {
    pub store: RecordStore,
    pub index: Box<dyn VectorIndex>,
}

impl Corpus {
    fn insert(&mut self, record: ImageRecord) -> Result<()> {
        // 先写索引，索引拒绝时记录不会进入存储
        self.index.insert(record.seq, &record.vector)?;
        self.store.put(record);
        Ok(())
    }
}

pub struct DeduperBuilder {
    conf_dir: Option<ConfDir>,
    opts: DedupOptions,
    embedder: Option<Arc<dyn Embedder>>,
}

impl DeduperBuilder {
    pub fn new(opts: DedupOptions) -> Self {
        Self { conf_dir: None, opts, embedder: None }
    }

    /// 使用数据库持久化，未设置时所有数据只保存在内存中
    pub fn conf_dir(mut self, conf_dir: ConfDir) -> Self {
        self.conf_dir = Some(conf_dir);
        self
    }

    /// 使用自定义的特征提取器，默认为 [`ThumbnailEmbedder`]
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub async fn open(self) -> anyhow::Result<Deduper> {
        let embedder = self
            .embedder
            .unwrap_or_else(|| Arc::new(ThumbnailEmbedder::new(self.opts.thumbnail_size)));
        let dimension = self.opts.embedding_dimension.unwrap_or_else(|| embedder.dimension());
        if dimension == 0 {
            return Err(anyhow!("特征向量维度不能为 0"));
        }
        if dimension != embedder.dimension() {
            warn!(
                "配置的向量维度 {} 与特征提取器输出 {} 不一致，所有图片都将添加失败",
                dimension,
                embedder.dimension()
            );
        }

        let index = create_index(
            self.opts.index,
            dimension,
            self.opts.metric,
            self.opts.max_neighbors,
            self.opts.ef_search,
        );
        let deduper = Deduper {
            corpus: RwLock::new(Corpus { store: RecordStore::new(), index }),
            requests: RequestManager::new(self.opts.request_ttl()),
            next_seq: AtomicU64::new(1),
            dimension,
            embedder,
            journal: None,
            opts: self.opts,
        };

        match self.conf_dir {
            Some(conf_dir) => {
                std::fs::create_dir_all(conf_dir.path())?;
                let journal = db::open_journal(conf_dir.database()).await?;
                deduper.replay(journal).await
            }
            None => Ok(deduper),
        }
    }
}

struct PreparedImage {
    original_name: Option<String>,
    hash: String,
    vector: Vec<f32>,
}

/// 图片去重引擎
pub struct Deduper {
    opts: DedupOptions,
    dimension: usize,
    corpus: RwLock<Corpus>,
    requests: RequestManager,
    embedder: Arc<dyn Embedder>,
    journal: Option<Database>,
    next_seq: AtomicU64,
}

impl Deduper {
    /// 从数据库中恢复所有请求和图片，并重建索引
    async fn replay(mut self, journal: Database) -> anyhow::Result<Self> {
        let start = Instant::now();
        let requests = crud::get_requests(&journal).await?;
        let images = crud::get_images(&journal).await?;
        info!("正在从数据库恢复 {} 个请求、{} 张图片", requests.len(), images.len());

        for row in requests {
            self.requests.restore(row.into());
        }

        let mut attached: Vec<(String, i64, String)> = Vec::with_capacity(images.len());
        {
            let corpus = self.corpus.get_mut().unwrap_or_else(PoisonError::into_inner);
            for row in images {
                attached.push((row.request_id.clone(), row.position, row.id.clone()));
                let record = ImageRecord::from(row);
                self.next_seq.fetch_max(record.seq + 1, Ordering::SeqCst);
                corpus
                    .insert(record)
                    .context("数据库中的向量与当前配置不一致，请检查特征提取器与维度设置")?;
            }
        }

        attached.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        for (request_id, _, image_id) in attached {
            // 已过期的请求不再恢复，但其图片仍然保留在索引中
            let _ = self.requests.attach(&request_id, &[image_id]);
        }

        info!("恢复完成，耗时 {:.2}s", start.elapsed().as_secs_f32());
        self.journal = Some(journal);
        Ok(self)
    }

    pub fn options(&self) -> &DedupOptions {
        &self.opts
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn read(&self) -> RwLockReadGuard<'_, Corpus> {
        self.corpus.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Corpus> {
        self.corpus.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 创建一个处于添加中状态的请求，写入数据库失败时撤销
    async fn begin_request(&self) -> Result<RequestEntry> {
        let entry = self.requests.create_request();
        if let Some(journal) = &self.journal {
            if let Err(e) = crud::add_request(journal, &entry).await {
                self.requests.discard(&entry.id);
                return Err(e.into());
            }
        }
        Ok(entry)
    }

    /// 添加一批图片
    ///
    /// 每张图片独立处理，单张失败不影响其他图片。即使全部失败，
    /// 请求也会被创建，之后查询将返回空结果。请求的过期时间从创建时开始计算，
    /// 但在添加完成之前不会过期。
    ///
    /// 特征提取并发进行，写入索引则按输入顺序依次完成，
    /// 因此相同的输入总会得到相同的序号与名称。
    pub async fn ingest(&self, inputs: Vec<Result<ImageInput>>) -> Result<IngestResponse> {
        let request = self.begin_request().await?;
        info!("请求 {}: 添加 {} 张图片", request.id, inputs.len());

        let concurrency = self.opts.ingest_concurrency.max(1);
        let prepared = futures::stream::iter(inputs)
            .map(|input| self.prepare(input))
            .buffered(concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut image_ids = vec![];
        let mut results = Vec::with_capacity(prepared.len());
        for (input_index, (start, image)) in prepared.into_iter().enumerate() {
            let result = match image {
                Ok(image) => self.commit(&request.id, input_index, image).await,
                Err(err) => Err(err),
            };
            self.log_outcome(&request.id, input_index, &result, start);
            let outcome = match result {
                Ok(record) => {
                    image_ids.push(record.id.clone());
                    Outcome::Success { image_id: record.id, assigned_name: record.name }
                }
                Err(err) => Outcome::Failure { error: ErrorInfo::from(&err) },
            };
            results.push(IngestResult { input_index, outcome });
        }

        // 添加中的请求不会被清理，这里不会失败
        self.requests.finish(&request.id, &image_ids)?;
        info!("请求 {}: 成功添加 {}/{} 张图片", request.id, image_ids.len(), results.len());

        Ok(IngestResponse { request_id: request.id, results })
    }

    /// 添加一批图片，所有输入均已解码
    pub async fn ingest_images(&self, inputs: Vec<ImageInput>) -> Result<IngestResponse> {
        self.ingest(inputs.into_iter().map(Ok).collect()).await
    }

    fn log_outcome(
        &self,
        request_id: &str,
        position: usize,
        result: &Result<ImageRecord>,
        start: Instant,
    ) {
        let duration = start.elapsed().as_secs_f32();
        match result {
            Ok(record) => {
                debug!("请求 {request_id}: 第 {position} 张图片添加为 {}", record.name);
                metrics::inc_ingest_image(None, duration);
            }
            Err(err) => {
                if err.is_internal() {
                    error!("请求 {request_id}: 第 {position} 张图片添加失败: {err}");
                } else {
                    warn!("请求 {request_id}: 第 {position} 张图片添加失败: {err}");
                }
                metrics::inc_ingest_image(Some(err.kind()), duration);
            }
        }
    }

    /// 校验图片并提取特征，此时尚未分配序号
    async fn prepare(&self, input: Result<ImageInput>) -> (Instant, Result<PreparedImage>) {
        let start = Instant::now();
        let prepared = match input {
            Ok(input) => self.extract_image(input).await,
            Err(err) => Err(err),
        };
        (start, prepared)
    }

    async fn extract_image(&self, input: ImageInput) -> Result<PreparedImage> {
        if input.data.len() > self.opts.max_image_size {
            return Err(DedupError::TooLarge {
                size: input.data.len(),
                limit: self.opts.max_image_size,
            });
        }

        let hash = hash_bytes(&input.data);
        let vector = self.extract(input.data).await?;
        check_dimension(self.dimension, &vector)?;
        Ok(PreparedImage { original_name: input.name, hash, vector })
    }

    /// 分配序号，写入数据库和索引
    async fn commit(
        &self,
        request_id: &str,
        position: usize,
        image: PreparedImage,
    ) -> Result<ImageRecord> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let record = ImageRecord {
            id: Uuid::new_v4().to_string(),
            seq,
            name: assigned_name(seq),
            original_name: image.original_name,
            request_id: request_id.to_owned(),
            hash: image.hash,
            vector: image.vector,
            created_at: Utc::now(),
        };

        if let Some(journal) = &self.journal {
            crud::add_image(journal, &record, position).await?;
        }
        self.write().insert(record.clone())?;

        Ok(record)
    }

    /// 在阻塞线程池中提取特征，超时后该图片视为失败
    async fn extract(&self, data: Vec<u8>) -> Result<Vec<f32>> {
        let embedder = self.embedder.clone();
        let handle = spawn_blocking(move || embedder.embed(&data));
        match timeout(self.opts.extraction_timeout(), handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(DedupError::ExtractionFailure(e.to_string())),
            Err(_) => Err(DedupError::ExtractionTimeout(self.opts.extraction_timeout_ms)),
        }
    }

    /// 按输入顺序获取请求中的所有图片记录
    pub fn get_by_request(&self, request_id: &str) -> Result<Vec<ImageRecord>> {
        let ids = self.requests.list_images(request_id)?;
        self.read().store.get_many(&ids)
    }

    /// 获取单张图片记录
    pub fn get_image(&self, image_id: &str) -> Result<ImageRecord> {
        self.read().store.get(image_id).cloned()
    }

    /// 查询请求中每张图片的重复图片
    ///
    /// 查询期间持有读锁，结果为查询开始时刻的快照
    pub fn find_duplicates(
        &self,
        request_id: &str,
        threshold: Option<f32>,
    ) -> Result<DuplicatesResponse> {
        let start = Instant::now();
        let threshold = threshold.unwrap_or(self.opts.threshold);
        let ids = self.requests.list_images(request_id)?;

        let corpus = self.read();
        let records = corpus.store.get_many(&ids).inspect_err(|e| error!("{e}"))?;
        let resolver = Resolver::new(&corpus.store, &*corpus.index, threshold, self.opts.scope);
        let images = resolver.resolve(&records).inspect_err(|e| {
            if e.is_internal() {
                error!("请求 {request_id}: 查询重复图片失败: {e}");
            }
        })?;
        drop(corpus);

        for image in &images {
            metrics::inc_duplicates_found(image.duplicates.len());
        }
        metrics::inc_query_duration(start.elapsed().as_secs_f32());
        debug!(
            "请求 {request_id}: 查询 {} 张图片，耗时 {:.2}ms",
            images.len(),
            start.elapsed().as_secs_f32() * 1000.
        );

        Ok(DuplicatesResponse { request_id: request_id.to_owned(), images })
    }

    /// 清理过期请求
    pub async fn evict_expired(&self) -> Result<usize> {
        let expired = self.requests.evict_expired();
        if expired.is_empty() {
            return Ok(0);
        }
        if let Some(journal) = &self.journal {
            crud::delete_requests(journal, &expired).await?;
        }
        info!("已清理 {} 个过期请求", expired.len());
        Ok(expired.len())
    }

    pub fn stats(&self) -> Stats {
        let images = self.read().store.len();
        Stats {
            images,
            requests: self.requests.len(),
            dimension: self.dimension,
            metric: self.opts.metric,
            index: self.opts.index,
            scope: self.opts.scope,
            threshold: self.opts.threshold,
        }
    }
}
