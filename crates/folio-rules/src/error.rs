use folio_core::models::ProcessingStatus;
use folio_core::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid rule definition: {0}")]
    InvalidDefinition(String),

    #[error("Malformed rule data: {0}")]
    Malformed(String),

    #[error("Invalid '{condition_type}' condition: {message}")]
    InvalidCondition {
        condition_type: String,
        message: String,
    },

    #[error("Invalid '{action_type}' action parameters: {message}")]
    InvalidParams {
        action_type: String,
        message: String,
    },

    #[error("Rule context has no media asset")]
    NoMedia,

    #[error("Media asset {0} not found")]
    MediaNotFound(Uuid),

    #[error("Cannot move asset from {from} to {to}")]
    InvalidTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl RuleError {
    pub fn condition(condition_type: &str, message: impl Into<String>) -> Self {
        RuleError::InvalidCondition {
            condition_type: condition_type.to_string(),
            message: message.into(),
        }
    }

    pub fn params(action_type: &str, message: impl Into<String>) -> Self {
        RuleError::InvalidParams {
            action_type: action_type.to_string(),
            message: message.into(),
        }
    }
}

impl From<RuleError> for AppError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::InvalidDefinition(msg) => AppError::InvalidInput(msg),
            RuleError::InvalidCondition { .. } | RuleError::InvalidParams { .. } => {
                AppError::InvalidInput(err.to_string())
            }
            RuleError::MediaNotFound(id) => AppError::NotFound(format!("Media asset {}", id)),
            RuleError::InvalidTransition { from, to } => AppError::InvalidTransition { from, to },
            RuleError::Store(source) => AppError::InternalWithSource {
                message: "Rule store failure".to_string(),
                source,
            },
            RuleError::Malformed(_) | RuleError::NoMedia => AppError::Internal(err.to_string()),
        }
    }
}

pub type RuleResult<T> = Result<T, RuleError>;
