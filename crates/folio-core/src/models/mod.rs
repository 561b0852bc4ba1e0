//! Domain models for the media pipeline

pub mod classification;
pub mod entity;
pub mod media;
pub mod workflow;

pub use classification::*;
pub use entity::*;
pub use media::*;
pub use workflow::*;
