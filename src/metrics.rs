use std::sync::LazyLock;

use prometheus::*;

use crate::error::ErrorKind;

static METRIC_INGEST_IMAGE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "imdedup_ingest_image_count",
        "count of the ingested images",
        &["status"]
    )
    .unwrap()
});

static METRIC_INGEST_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("imdedup_ingest_duration", "duration of the per-image ingestion in seconds")
        .unwrap()
});

static METRIC_QUERY_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("imdedup_query_duration", "duration of the duplicate query in seconds")
        .unwrap()
});

static METRIC_DUPLICATES_FOUND: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "imdedup_duplicates_found",
        "number of duplicates found per image",
        vec![0., 1., 2., 4., 8., 16., 32., 64.]
    )
    .unwrap()
});

/// 记录一张图片的添加结果
pub fn inc_ingest_image(failure: Option<ErrorKind>, duration: f32) {
    let status = match failure {
        None => "success",
        Some(ErrorKind::DecodeError) => "decode_error",
        Some(ErrorKind::TooLarge) => "too_large",
        Some(ErrorKind::ExtractionTimeout) => "extraction_timeout",
        Some(ErrorKind::ExtractionFailure) => "extraction_failure",
        Some(ErrorKind::DimensionMismatch) => "dimension_mismatch",
        Some(_) => "internal",
    };
    METRIC_INGEST_IMAGE_COUNT.with_label_values(&[status]).inc();
    METRIC_INGEST_DURATION.observe(duration as f64);
}

pub fn inc_query_duration(duration: f32) {
    METRIC_QUERY_DURATION.observe(duration as f64);
}

pub fn inc_duplicates_found(count: usize) {
    METRIC_DUPLICATES_FOUND.observe(count as f64);
}

/// 以 prometheus 文本格式导出所有指标
pub fn export() -> Result<String> {
    TextEncoder::new().encode_to_string(&gather())
}
