use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum_typed_multipart::TypedMultipart;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::StreamExt;
use log::info;
use serde_json::{Value, json};
use tokio::task::block_in_place;

use super::error::{BadRequest, Result};
use super::state::AppState;
use super::types::*;
use crate::config::check_threshold;
use crate::error::DedupError;
use crate::metrics;
use crate::types::*;

/// 同时下载的图片数量
const DOWNLOAD_CONCURRENCY: usize = 8;

/// 添加图片到数据库
#[utoipa::path(
    post,
    path = "/images",
    request_body(content = AddImagesForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = IngestResponse),
    )
)]
pub async fn add_images_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<AddImagesRequest>,
) -> Result<Json<IngestResponse>> {
    let inputs = data
        .0
        .file
        .into_iter()
        .map(|file| Ok(ImageInput { name: file.metadata.file_name, data: file.contents.into() }))
        .collect();
    let response = state.deduper.ingest(inputs).await?;
    Ok(Json(response))
}

/// 添加 Base64 编码的图片
#[utoipa::path(
    post,
    path = "/images/base64",
    request_body = Base64ImagesRequest,
    responses(
        (status = 200, body = IngestResponse),
    )
)]
pub async fn add_base64_images_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<Base64ImagesRequest>,
) -> Result<Json<IngestResponse>> {
    let inputs = data
        .base64_images
        .iter()
        .map(|s| {
            STANDARD
                .decode(s.trim())
                .map(ImageInput::new)
                .map_err(|e| DedupError::Decode(format!("无效的 Base64 数据: {e}")))
        })
        .collect();
    let response = state.deduper.ingest(inputs).await?;
    Ok(Json(response))
}

/// 从 URL 下载并添加图片
///
/// 下载失败、返回错误状态码或内容为空的图片记为解码失败，不影响其他图片
#[utoipa::path(
    post,
    path = "/images/urls",
    request_body = UrlImagesRequest,
    responses(
        (status = 200, body = IngestResponse),
    )
)]
pub async fn add_url_images_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<UrlImagesRequest>,
) -> Result<Json<IngestResponse>> {
    let max_size = state.deduper.options().max_image_size;
    let http = &state.http;
    let inputs = futures::stream::iter(data.image_urls)
        .map(|url| async move { download(http, &url, max_size).await })
        .buffered(DOWNLOAD_CONCURRENCY)
        .collect::<Vec<_>>()
        .await;
    let response = state.deduper.ingest(inputs).await?;
    Ok(Json(response))
}

async fn download(
    client: &reqwest::Client,
    url: &str,
    max_size: usize,
) -> std::result::Result<ImageInput, DedupError> {
    info!("正在下载图片: {url}");
    let decode_error = |e: reqwest::Error| DedupError::Decode(format!("下载图片失败: {url}: {e}"));

    let resp = client.get(url).send().await.and_then(|r| r.error_for_status()).map_err(decode_error)?;
    if let Some(size) = resp.content_length().filter(|&size| size as usize > max_size) {
        return Err(DedupError::TooLarge { size: size as usize, limit: max_size });
    }
    let data = resp.bytes().await.map_err(decode_error)?;
    if data.is_empty() {
        return Err(DedupError::Decode(format!("下载的图片为空: {url}")));
    }
    Ok(ImageInput::with_name(url, data))
}

/// 查询请求中的重复图片
#[utoipa::path(
    get,
    path = "/duplicates/{request_id}",
    params(
        ("request_id" = String, Path, description = "添加图片时返回的请求 ID"),
        DuplicatesQuery,
    ),
    responses(
        (status = 200, body = DuplicatesResponse),
        (status = 404, description = "请求不存在"),
    )
)]
pub async fn duplicates_handler(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    Query(query): Query<DuplicatesQuery>,
) -> Result<Json<DuplicatesResponse>> {
    if let Some(threshold) = query.threshold {
        check_threshold(threshold).map_err(BadRequest)?;
    }

    info!("正在查询请求 {} 的重复图片", request_id);
    let response = block_in_place(|| state.deduper.find_duplicates(&request_id, query.threshold))?;
    Ok(Json(response))
}

/// 获取图片信息
#[utoipa::path(
    get,
    path = "/images/{image_id}",
    params(("image_id" = String, Path, description = "图片 ID")),
    responses(
        (status = 200, body = ImageInfo),
        (status = 404, description = "图片不存在"),
    )
)]
pub async fn image_handler(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<String>,
) -> Result<Json<ImageInfo>> {
    let record = state.deduper.get_image(&image_id)?;
    Ok(Json(record.into()))
}

/// 服务状态检查
#[utoipa::path(get, path = "/health")]
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// 获取运行状态统计
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, body = Stats),
    )
)]
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<Stats> {
    Json(state.deduper.stats())
}

/// 导出 prometheus 指标
#[utoipa::path(get, path = "/metrics")]
pub async fn metrics_handler() -> Result<String> {
    Ok(metrics::export()?)
}
