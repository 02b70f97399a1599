//! Shared library for the anime/manga ID mapper.
//!
//! This crate provides common functionality used by the mapper crates:
//! - Configuration management
//! - Identity models (services, media types, ID nodes, source records)
//! - File path utilities
//! - Logging infrastructure

pub mod config;
pub mod logging;
pub mod models;
pub mod paths;

// Re-export commonly used types
pub use config::{Config, InputLayout, MapperConfig};
pub use logging::LogConfig;
pub use models::*;
pub use paths::DataPaths;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
