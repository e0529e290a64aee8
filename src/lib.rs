pub mod cli;
pub mod config;
pub mod db;
pub mod dedup;
pub mod distance;
pub mod embed;
pub mod error;
pub mod index;
mod metrics;
pub mod request;
pub mod resolver;
mod server;
pub mod store;
pub mod types;
pub mod utils;

pub use config::{DedupOptions, Opts};
pub use dedup::{Deduper, DeduperBuilder};
pub use error::{DedupError, ErrorKind};
