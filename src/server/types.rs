use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// 添加图片请求参数
#[derive(TryFromMultipart)]
pub struct AddImagesRequest {
    pub file: Vec<FieldData<Bytes>>,
}

/// 添加图片表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct AddImagesForm {
    /// 上传的图片文件，可以是多张图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
}

/// 使用 Base64 编码添加图片
#[derive(Debug, Deserialize, ToSchema)]
pub struct Base64ImagesRequest {
    /// Base64 编码的图片列表
    pub base64_images: Vec<String>,
}

/// 通过 URL 添加图片
#[derive(Debug, Deserialize, ToSchema)]
pub struct UrlImagesRequest {
    /// 图片地址列表，按顺序下载
    pub image_urls: Vec<String>,
}

/// 重复图片查询参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DuplicatesQuery {
    /// 覆盖默认的相似度阈值
    pub threshold: Option<f32>,
}
