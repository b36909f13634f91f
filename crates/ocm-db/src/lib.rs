#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod repositories;
pub mod setup;

// Re-export repository implementations
pub use repositories::SqliteContentStore;

// Re-export setup functions for convenient access
pub use setup::{setup_database, setup_memory_database};
