#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod content_cache;
mod manager;
pub mod queue;

pub use content_cache::ContentCacheManager;
pub use manager::{DownloadScheduler, ImageTicket, SchedulerConfig};
pub use queue::{ImageQueue, SchedulerSnapshot};
