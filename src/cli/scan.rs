use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressIterator};
use log::{info, warn};
use regex::Regex;
use walkdir::WalkDir;

use super::{open_deduper, print_duplicates};
use crate::cli::SubCommandExtend;
use crate::config::{DedupOptions, Opts, OutputFormat};
use crate::types::{ImageInput, Outcome};
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct ScanCommand {
    #[command(flatten)]
    pub dedup: DedupOptions,
    /// 图片所在目录
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png,webp")]
    pub suffix: String,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ScanCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let re_suf = format!("(?i)^({})$", self.suffix.replace(',', "|"));
        let re_suf = Regex::new(&re_suf)?;

        let entries = scan_directory(&self.path, &re_suf);
        info!("扫描完成，共 {} 张图片", entries.len());

        let pb = ProgressBar::new(entries.len() as u64).with_style(pb_style());
        pb.set_message("读取图片");
        let inputs = futures::stream::iter(entries)
            .map(|entry| async move {
                let data = tokio::fs::read(&entry).await;
                (entry, data)
            })
            .buffered(32)
            .filter_map(|(entry, data)| {
                pb.inc(1);
                let input = match data {
                    Ok(data) => Some(ImageInput::with_name(entry, data)),
                    Err(e) => {
                        pb.println(format!("读取图片失败: {entry}: {e}"));
                        None
                    }
                };
                std::future::ready(input)
            })
            .collect::<Vec<_>>()
            .await;
        pb.finish_with_message("读取完成");

        let deduper = open_deduper(opts, &self.dedup).await?;
        let names = inputs.iter().map(|input| input.name.clone()).collect::<Vec<_>>();
        let response = deduper.ingest_images(inputs).await?;

        for (result, name) in response.results.iter().zip(&names) {
            if let Outcome::Failure { error } = &result.outcome {
                warn!("添加图片失败: {}: {}", name.as_deref().unwrap_or_default(), error.message);
            }
        }
        info!(
            "请求 ID: {}，成功添加 {}/{} 张图片",
            response.request_id,
            response.succeeded(),
            response.results.len()
        );

        let duplicates = deduper.find_duplicates(&response.request_id, None)?;
        print_duplicates(&duplicates, self.output_format)
    }
}

fn scan_directory(path: &Path, re_suf: &Regex) -> Vec<String> {
    info!("开始扫描目录: {}", path.display());
    let pb = ProgressBar::no_length().with_style(pb_style());
    let mut entries = WalkDir::new(path)
        .into_iter()
        .progress_with(pb)
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            let ext = path.extension()?;
            (path.is_file() && re_suf.is_match(&ext.to_string_lossy()))
                .then(|| path.to_string_lossy().to_string())
        })
        .collect::<Vec<_>>();
    // 保证输出顺序稳定
    entries.sort();
    entries
}
