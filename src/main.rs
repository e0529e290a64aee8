use clap::Parser;
use env_logger::Env;
use imdedup::Opts;
use imdedup::cli::SubCommandExtend;
use imdedup::config::SubCommand;
use tikv_jemallocator::Jemalloc;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Server(config) => config.run(&opts).await,
        SubCommand::Scan(config) => config.run(&opts).await,
        SubCommand::Query(config) => config.run(&opts).await,
    }
}
