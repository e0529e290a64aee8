use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{DedupError, Result};

/// 一次添加图片请求
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEntry {
    pub id: String,
    /// 按输入顺序排列的图片 ID，只增不减
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// 图片仍在添加中，此时请求不会过期
    pub ingesting: bool,
}

/// 请求生命周期管理
///
/// 设置 ttl 后，过期的请求视为不存在
pub struct RequestManager {
    requests: RwLock<HashMap<String, RequestEntry>>,
    ttl: Option<Duration>,
}

impl RequestManager {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self { requests: RwLock::new(HashMap::new()), ttl }
    }

    /// 创建一个新的请求
    ///
    /// 新请求处于添加中状态，调用 [`RequestManager::finish`] 之前不会过期或被清理
    pub fn create_request(&self) -> RequestEntry {
        let entry = RequestEntry {
            id: Uuid::new_v4().to_string(),
            images: vec![],
            created_at: Utc::now(),
            ingesting: true,
        };
        self.write().insert(entry.id.clone(), entry.clone());
        entry
    }

    /// 登记请求的全部图片并结束添加状态
    pub fn finish(&self, request_id: &str, image_ids: &[String]) -> Result<()> {
        let mut requests = self.write();
        let entry = requests
            .get_mut(request_id)
            .ok_or_else(|| DedupError::RequestNotFound(request_id.to_owned()))?;
        entry.images.extend_from_slice(image_ids);
        entry.ingesting = false;
        Ok(())
    }

    /// 丢弃一个未能持久化的请求
    pub fn discard(&self, request_id: &str) {
        self.write().remove(request_id);
    }

    /// 从数据库中恢复请求，已过期的请求会被忽略
    pub fn restore(&self, entry: RequestEntry) -> bool {
        if self.is_expired(&entry, Utc::now()) {
            return false;
        }
        self.write().insert(entry.id.clone(), entry);
        true
    }

    /// 将图片登记到请求中
    pub fn attach(&self, request_id: &str, image_ids: &[String]) -> Result<()> {
        let mut requests = self.write();
        let entry = requests
            .get_mut(request_id)
            .ok_or_else(|| DedupError::RequestNotFound(request_id.to_owned()))?;
        entry.images.extend_from_slice(image_ids);
        Ok(())
    }

    /// 获取请求中的图片 ID 列表
    pub fn list_images(&self, request_id: &str) -> Result<Vec<String>> {
        let requests = self.requests.read().unwrap_or_else(PoisonError::into_inner);
        match requests.get(request_id) {
            Some(entry) if !self.is_expired(entry, Utc::now()) => Ok(entry.images.clone()),
            _ => Err(DedupError::RequestNotFound(request_id.to_owned())),
        }
    }

    /// 清理过期请求，返回被清理的请求 ID
    pub fn evict_expired(&self) -> Vec<String> {
        if self.ttl.is_none() {
            return vec![];
        }
        let now = Utc::now();
        let mut requests = self.write();
        let expired = requests
            .values()
            .filter(|entry| self.is_expired(entry, now))
            .map(|entry| entry.id.clone())
            .collect::<Vec<_>>();
        for id in &expired {
            requests.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.requests.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RequestEntry>> {
        self.requests.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &RequestEntry, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(_) if entry.ingesting => false,
            Some(ttl) => (now - entry.created_at).to_std().is_ok_and(|age| age > ttl),
            None => false,
        }
    }
}
