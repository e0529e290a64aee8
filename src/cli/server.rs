use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use tokio::net::TcpListener;
use tokio::time::{Duration, interval};

use super::open_deduper;
use crate::cli::SubCommandExtend;
use crate::config::DedupOptions;
use crate::{Opts, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub dedup: DedupOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// 单次请求的最大字节数
    #[arg(long, value_name = "BYTES", default_value_t = 100 * 1024 * 1024)]
    pub max_body_size: usize,
    /// 通过 URL 下载图片的超时时间，单位秒
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub download_timeout: u64,
    /// 清理过期请求的间隔，单位秒
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub evict_interval: u64,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let deduper = Arc::new(open_deduper(opts, &self.dedup).await?);

        if self.dedup.request_ttl.is_some() {
            let deduper = deduper.clone();
            let mut ticker = interval(Duration::from_secs(self.evict_interval.max(1)));
            tokio::spawn(async move {
                loop {
                    ticker.tick().await;
                    if let Err(e) = deduper.evict_expired().await {
                        error!("清理过期请求失败: {e}");
                    }
                }
            });
        }

        // 创建应用状态
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.download_timeout))
            .build()?;
        let state = server::AppState::new(deduper, http);

        // 创建应用
        let app = server::create_app(state, self.max_body_size);

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
