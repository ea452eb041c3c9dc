//! Grounded Core Library
//!
//! This crate provides the foundational utilities shared by every Grounded crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (application + pipeline settings)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, PipelineSettings};
pub use error::{AppError, AppResult};
pub use logging::LogFormat;
