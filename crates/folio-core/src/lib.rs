//! Shared domain types for the folio media pipeline.
//!
//! Every other crate in the workspace depends on this one for the asset model,
//! rule definitions, the service-level error type and configuration.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
