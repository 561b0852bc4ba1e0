//! Vision classification for uploaded images
//!
//! The pipeline talks to a [`VisionClassifier`]; [`ClaudeVisionClassifier`]
//! implements it on Anthropic's Messages API. Callers own fallback values:
//! classifiers report failures as [`VisionError`] and never invent results.

pub mod classifier;
pub mod claude;
mod parse;

pub use classifier::{DisabledClassifier, VisionClassifier, VisionError, VisionResult};
pub use claude::{ClaudeVisionClassifier, ClaudeVisionConfig};
