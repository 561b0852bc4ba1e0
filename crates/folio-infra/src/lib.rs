//! Folio infrastructure library
//!
//! Process-level plumbing shared by folio binaries. Currently that is
//! tracing subscriber setup.

pub mod telemetry;

pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};
