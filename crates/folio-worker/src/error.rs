use folio_core::models::{PipelineStep, ProcessingStatus};
use folio_core::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Media asset {0} not found")]
    NotFound(Uuid),

    #[error("Media asset {id} is {status}; cannot {operation}")]
    InvalidState {
        id: Uuid,
        status: ProcessingStatus,
        operation: &'static str,
    },

    #[error("Step {step} failed: {message}")]
    Step { step: PipelineStep, message: String },

    #[error("Record store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn step(step: PipelineStep, err: impl std::fmt::Display) -> Self {
        PipelineError::Step {
            step,
            message: err.to_string(),
        }
    }

    /// Step the error was raised in, if any.
    pub fn failed_step(&self) -> Option<PipelineStep> {
        match self {
            PipelineError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotFound(id) => AppError::NotFound(format!("Media asset {}", id)),
            PipelineError::InvalidState { .. } => AppError::Conflict(err.to_string()),
            PipelineError::Step { .. } => AppError::ImageProcessing(err.to_string()),
            PipelineError::Store(source) => AppError::InternalWithSource {
                message: "Media record store failure".to_string(),
                source,
            },
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
