use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::{ImageRow, RequestRow, encode_vector, to_millis};
use crate::request::RequestEntry;
use crate::store::ImageRecord;

/// 添加请求记录
pub async fn add_request<'c, E>(executor: E, entry: &RequestEntry) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO request (id, created_at)
        VALUES (?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(to_millis(entry.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// 添加图片记录
pub async fn add_image<'c, E>(executor: E, record: &ImageRecord, position: usize) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO image (seq, id, request_id, position, original_name, hash, vector, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.seq as i64)
    .bind(&record.id)
    .bind(&record.request_id)
    .bind(position as i64)
    .bind(&record.original_name)
    .bind(&record.hash)
    .bind(encode_vector(&record.vector))
    .bind(to_millis(record.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// 获取所有请求
pub async fn get_requests(executor: &SqlitePool) -> Result<Vec<RequestRow>> {
    sqlx::query_as::<_, RequestRow>(
        r#"
        SELECT id, created_at FROM request ORDER BY created_at ASC
        "#,
    )
    .fetch_all(executor)
    .await
}

/// 按插入顺序获取所有图片
pub async fn get_images(executor: &SqlitePool) -> Result<Vec<ImageRow>> {
    sqlx::query_as::<_, ImageRow>(
        r#"
        SELECT seq, id, request_id, position, original_name, hash, vector, created_at
        FROM image ORDER BY seq ASC
        "#,
    )
    .fetch_all(executor)
    .await
}

/// 删除请求记录，图片记录保留在库中
pub async fn delete_requests(executor: &SqlitePool, ids: &[String]) -> Result<()> {
    let mut tx = executor.begin().await?;
    for id in ids {
        sqlx::query(
            r#"
            DELETE FROM request WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}
