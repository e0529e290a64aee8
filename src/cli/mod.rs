mod query;
mod scan;
pub mod server;

pub use query::*;
pub use scan::*;
pub use server::*;

use crate::config::{Opts, OutputFormat};
use crate::types::DuplicatesResponse;
use crate::{DedupOptions, Deduper, DeduperBuilder};

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 根据全局选项打开去重引擎
async fn open_deduper(opts: &Opts, dedup: &DedupOptions) -> anyhow::Result<Deduper> {
    let builder = DeduperBuilder::new(dedup.clone());
    let builder = if opts.memory { builder } else { builder.conf_dir(opts.conf_dir.clone()) };
    builder.open().await
}

/// 打印重复图片查询结果
fn print_duplicates(response: &DuplicatesResponse, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?)
        }
        OutputFormat::Table => {
            if response.is_empty() {
                println!("No duplicates found");
                return Ok(());
            }
            for image in response.images.iter().filter(|image| !image.duplicates.is_empty()) {
                println!("{}", display_name(&image.assigned_name, &image.original_name));
                for dup in &image.duplicates {
                    println!(
                        "\t{:.4}\t{}",
                        dup.distance,
                        display_name(&dup.assigned_name, &dup.original_name)
                    );
                }
            }
        }
    }
    Ok(())
}

fn display_name<'a>(assigned: &'a str, original: &'a Option<String>) -> &'a str {
    original.as_deref().unwrap_or(assigned)
}
