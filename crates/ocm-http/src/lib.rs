#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod client;
mod config;
mod error;
mod http;
mod transport;

pub use client::{ContentApiClient, DefaultContentApiClient};
pub use config::HttpClientConfig;
pub use error::{HttpError, HttpResult};
pub use http::{HttpBackend, ReqwestBackend};
pub use transport::HttpDownloadTransport;
