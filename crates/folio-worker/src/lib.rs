//! Pipeline orchestration for uploaded media
//!
//! - [`MediaPipeline`] runs the per-asset step sequence with checkpoints.
//! - [`PipelineQueue`] bounds how many pipeline runs execute at once.
//! - [`IngestService`] turns an upload into a stored original, a pending
//!   record and a queued pipeline job, and handles resubmission.
//! - [`EntityLinker`] promotes a finished asset into an artwork or tattoo.

pub mod error;
pub mod ingest;
pub mod linking;
pub mod pipeline;
pub mod queue;

pub use error::{PipelineError, PipelineResult};
pub use ingest::{IngestService, UploadRequest};
pub use linking::EntityLinker;
pub use pipeline::{MediaPipeline, ProcessRequest};
pub use queue::{PipelineJob, PipelineQueue, PipelineQueueConfig};
