use std::sync::Arc;

use crate::Deduper;

/// 应用状态
pub struct AppState {
    /// 去重引擎，整个进程只有一个实例
    pub deduper: Arc<Deduper>,
    /// 下载图片用的 HTTP 客户端，已设置超时
    pub http: reqwest::Client,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(deduper: Arc<Deduper>, http: reqwest::Client) -> Arc<Self> {
        Arc::new(AppState { deduper, http })
    }
}
