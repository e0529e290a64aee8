//! 请求与图片的持久化日志
//!
//! `request` 表记录请求 ID 与创建时间，`image` 表按全局序号 `seq` 记录每张图片的
//! 所属请求、输入位置和特征向量。数据只追加不修改，启动时按 `seq` 顺序重放即可
//! 重建索引；过期请求只删除 `request` 中的行，图片保留。

use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::Result;

pub mod crud;
pub mod model;

pub use model::*;

pub type Database = SqlitePool;

/// 打开（必要时创建）数据库并执行迁移
pub async fn open_journal(filename: impl AsRef<Path>) -> Result<Database> {
    let filename = filename.as_ref();
    info!("打开数据库: {}", filename.display());

    let options = SqliteConnectOptions::new()
        .filename(filename)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    // 写入按输入顺序串行进行，少量连接即可
    let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;

    sqlx::migrate!().run(&pool).await.map_err(sqlx::Error::from)?;
    debug!("数据库迁移完成");

    Ok(pool)
}
