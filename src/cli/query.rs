use anyhow::{Result, bail};
use clap::Parser;

use super::{open_deduper, print_duplicates};
use crate::cli::SubCommandExtend;
use crate::config::{DedupOptions, Opts, OutputFormat};

#[derive(Parser, Debug, Clone)]
pub struct QueryCommand {
    #[command(flatten)]
    pub dedup: DedupOptions,
    /// 添加图片时返回的请求 ID
    pub request_id: String,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for QueryCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        if opts.memory {
            bail!("内存模式下没有可供查询的历史请求");
        }
        let deduper = open_deduper(opts, &self.dedup).await?;
        let duplicates = deduper.find_duplicates(&self.request_id, None)?;
        print_duplicates(&duplicates, self.output_format)
    }
}
