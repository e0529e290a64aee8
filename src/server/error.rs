use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::error::{DedupError, ErrorKind};

/// API错误类型
pub struct AppError(pub anyhow::Error);

/// 请求参数不合法
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BadRequest(pub String);

pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(BadRequest(message)) = self.0.downcast_ref::<BadRequest>() {
            return (StatusCode::BAD_REQUEST, Json(json!({ "detail": message }))).into_response();
        }
        let Some(err) = self.0.downcast_ref::<DedupError>() else {
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("Something went wrong: {}", self.0))
                .into_response();
        };
        // 内部错误只返回通用信息，具体原因已记录在日志中
        let (status, message) = match err.kind() {
            ErrorKind::RequestNotFound | ErrorKind::ImageNotFound => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            ErrorKind::IndexCorruption | ErrorKind::Storage => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_owned())
            }
            _ => (StatusCode::BAD_REQUEST, err.to_string()),
        };
        (status, Json(json!({ "kind": err.kind(), "detail": message }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
