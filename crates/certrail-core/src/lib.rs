//! Core utilities and types shared across all certrail crates

pub mod app_settings;
pub mod error;
pub mod types;

pub use app_settings::{AcmeSettings, AppSettings, CacheSettings, DatabaseSettings, ServerSettings};
pub use error::{ServiceError, ServiceResult};
pub use types::{DBDateTime, UtcDateTime};

// Re-export external dependencies
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tracing;
