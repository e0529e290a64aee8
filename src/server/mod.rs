mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::add_images_handler,
        api::add_base64_images_handler,
        api::add_url_images_handler,
        api::duplicates_handler,
        api::image_handler,
        api::health_handler,
        api::stats_handler,
        api::metrics_handler,
    ),
    components(schemas(types::AddImagesForm, types::Base64ImagesRequest, types::UrlImagesRequest))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>, body_limit: usize) -> Router {
    Router::new()
        .route("/images", post(api::add_images_handler))
        .route("/images/base64", post(api::add_base64_images_handler))
        .route("/images/urls", post(api::add_url_images_handler))
        .route("/images/{image_id}", get(api::image_handler))
        .route("/duplicates/{request_id}", get(api::duplicates_handler))
        .route("/health", get(api::health_handler))
        .route("/stats", get(api::stats_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::distance::Metric;
    use crate::embed::Embedder;
    use crate::error::{DedupError, Result};
    use crate::{DedupOptions, DeduperBuilder};

    struct TextEmbedder;

    impl Embedder for TextEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, data: &[u8]) -> Result<Vec<f32>> {
            let text = std::str::from_utf8(data).map_err(|e| DedupError::Decode(e.to_string()))?;
            text.split(',')
                .map(|s| s.parse().map_err(|_| DedupError::Decode(s.to_owned())))
                .collect()
        }
    }

    async fn test_router() -> Router {
        let opts = DedupOptions { metric: Metric::Euclidean, ..Default::default() };
        let deduper =
            DeduperBuilder::new(opts).embedder(Arc::new(TextEmbedder)).open().await.unwrap();
        let http = reqwest::Client::builder().timeout(Duration::from_secs(5)).build().unwrap();
        create_app(AppState::new(Arc::new(deduper), http), 1 << 20)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_base64(images: &[&str]) -> Request<Body> {
        let body = json!({ "base64_images": images });
        Request::builder()
            .method("POST")
            .uri("/images/base64")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn health() {
        let app = test_router().await;
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ingest_and_query() {
        let app = test_router().await;
        let a = STANDARD.encode("1,0");
        let (status, body) = send(&app, post_base64(&[&a, &a, "!!not base64!!"])).await;
        assert_eq!(status, StatusCode::OK);

        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["status"], "success");
        assert_eq!(results[0]["assigned_name"], "image_1");
        assert_eq!(results[2]["status"], "failure");
        assert_eq!(results[2]["error"]["kind"], "DecodeError");

        let request_id = body["request_id"].as_str().unwrap();
        let (status, body) = send(&app, get(&format!("/duplicates/{request_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        let images = body["images"].as_array().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0]["duplicates"][0]["image_id"], results[1]["image_id"]);
        assert_eq!(images[0]["duplicates"][0]["distance"], 0.0);

        let image_id = results[0]["image_id"].as_str().unwrap();
        let (status, body) = send(&app, get(&format!("/images/{image_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["request_id"], request_id);

        let (_, body) = send(&app, get("/stats")).await;
        assert_eq!(body["images"], 2);
        assert_eq!(body["metric"], "euclidean");
    }

    /// 在本地端口上提供图片下载，返回服务地址
    async fn serve_images() -> String {
        let images = Router::new()
            .route("/a", axum::routing::get(|| async { "1,0" }))
            .route("/empty", axum::routing::get(|| async { "" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, images).await });
        format!("http://{addr}")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ingest_from_urls() {
        let base = serve_images().await;
        let app = test_router().await;
        let urls = ["a", "missing", "empty", "a"].map(|path| format!("{base}/{path}"));
        let body = json!({ "image_urls": &urls });
        let request = Request::builder()
            .method("POST")
            .uri("/images/urls")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0]["status"], "success");
        assert_eq!(results[1]["error"]["kind"], "DecodeError");
        assert_eq!(results[2]["error"]["kind"], "DecodeError");
        assert_eq!(results[3]["status"], "success");

        let request_id = body["request_id"].as_str().unwrap();
        let (_, body) = send(&app, get(&format!("/duplicates/{request_id}"))).await;
        assert_eq!(body["images"][0]["original_name"], urls[0].as_str());
        assert_eq!(body["images"][0]["duplicates"][0]["image_id"], results[3]["image_id"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn not_found() {
        let app = test_router().await;
        let (status, body) = send(&app, get("/duplicates/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "RequestNotFound");

        let (status, body) = send(&app, get("/images/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "ImageNotFound");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_threshold() {
        let app = test_router().await;
        let (_, body) = send(&app, post_base64(&[])).await;
        let request_id = body["request_id"].as_str().unwrap();

        let (status, _) = send(&app, get(&format!("/duplicates/{request_id}?threshold=-1"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, get(&format!("/duplicates/{request_id}?threshold=2"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = send(&app, get(&format!("/duplicates/{request_id}?threshold=1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["images"].as_array().unwrap().is_empty());
    }
}
