#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod env;
mod logging;
mod runtime;

pub use env::{settings_from_env, settings_from_lookup};
pub use logging::init_tracing;
pub use runtime::{OcmRuntime, build_runtime};
