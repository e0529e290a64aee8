use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;
use crate::distance::Metric;
use crate::index::IndexKind;
use crate::resolver::Scope;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let path = ProjectDirs::from("", "imdedup", "imdedup")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".imdedup"));
    ConfDir { path }
});

fn default_conf_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap_or(".imdedup")
}

#[derive(Parser, Debug, Clone)]
pub struct DedupOptions {
    /// 缩略图特征的边长，特征向量维度为边长的平方
    #[arg(long, value_name = "SIZE", default_value_t = 16)]
    pub thumbnail_size: u32,
    /// 特征向量维度，默认与特征提取器输出一致
    #[arg(long, value_name = "DIM")]
    pub embedding_dimension: Option<usize>,
    /// 向量距离度量
    #[arg(long, value_enum, default_value_t = Metric::Cosine)]
    pub metric: Metric,
    /// 两张图片被视为重复的最大距离
    #[arg(short, long, default_value_t = 0.1, value_parser = parse_threshold)]
    pub threshold: f32,
    /// 单张图片特征提取的超时时间，单位毫秒
    #[arg(long, value_name = "MS", default_value_t = 10_000)]
    pub extraction_timeout_ms: u64,
    /// 重复图片的搜索范围
    #[arg(long, value_enum, default_value_t = Scope::Corpus)]
    pub scope: Scope,
    /// 索引类型
    #[arg(long, value_enum, default_value_t = IndexKind::Flat)]
    pub index: IndexKind,
    /// HNSW 每次查询返回的最大近邻数量
    #[arg(long, value_name = "N", default_value_t = 64)]
    pub max_neighbors: usize,
    /// HNSW 搜索时每次访问的节点数量
    #[arg(long, value_name = "N", default_value_t = 64)]
    pub ef_search: usize,
    /// 请求保留时间，单位秒，不填则永久保留
    #[arg(long, value_name = "SECS")]
    pub request_ttl: Option<u64>,
    /// 单张图片的最大字节数
    #[arg(long, value_name = "BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_image_size: usize,
    /// 同时处理的图片数量，默认为 CPU 核心数
    #[arg(long, value_name = "N", default_value_t = num_cpus::get())]
    pub ingest_concurrency: usize,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            thumbnail_size: 16,
            embedding_dimension: None,
            metric: Metric::Cosine,
            threshold: 0.1,
            extraction_timeout_ms: 10_000,
            scope: Scope::Corpus,
            index: IndexKind::Flat,
            max_neighbors: 64,
            ef_search: 64,
            request_ttl: None,
            max_image_size: 10 * 1024 * 1024,
            ingest_concurrency: num_cpus::get(),
        }
    }
}

impl DedupOptions {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }

    pub fn request_ttl(&self) -> Option<Duration> {
        self.request_ttl.map(Duration::from_secs)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imdedup", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imdedup 数据目录
    #[arg(short, long, default_value = default_conf_dir())]
    pub conf_dir: ConfDir,
    /// 不使用数据库，所有数据只保存在内存中
    #[arg(long)]
    pub memory: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 启动 HTTP 去重服务
    Server(ServerCommand),
    /// 扫描目录中的图片并查找重复
    Scan(ScanCommand),
    /// 查询已添加请求中的重复图片
    Query(QueryCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("imdedup.db")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

/// 相似度阈值必须位于 [0, 1] 之间
pub fn check_threshold(v: f32) -> Result<f32, String> {
    if !(0. ..=1.).contains(&v) {
        return Err(format!("阈值必须位于 [0, 1] 之间: {v}"));
    }
    Ok(v)
}

fn parse_threshold(s: &str) -> Result<f32, String> {
    let v: f32 = s.parse().map_err(|e| format!("无效的阈值 {s}: {e}"))?;
    check_threshold(v)
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_parser() {
        assert_eq!(parse_threshold("0.25"), Ok(0.25));
        assert!(parse_threshold("-1").is_err());
        assert!(parse_threshold("NaN").is_err());
        assert!(parse_threshold("abc").is_err());
        assert_eq!(parse_threshold("1"), Ok(1.));
        assert!(parse_threshold("1.01").is_err());
        assert!(parse_threshold("inf").is_err());
    }

    #[test]
    fn parse_scan_command() {
        let opts = Opts::try_parse_from([
            "imdedup", "--memory", "scan", "/tmp/images", "--metric", "euclidean", "-t", "0.5",
        ])
        .unwrap();
        assert!(opts.memory);
        let SubCommand::Scan(cmd) = opts.subcmd else { panic!("expected scan") };
        assert_eq!(cmd.dedup.metric, Metric::Euclidean);
        assert_eq!(cmd.dedup.threshold, 0.5);
        assert_eq!(cmd.dedup.scope, Scope::Corpus);
    }
}
