//! Folio Storage Library
//!
//! Object store abstraction for original images and their derived variants,
//! with local filesystem, S3 (via `object_store`) and in-memory backends.
//!
//! # Storage key format
//!
//! Every object lives under a namespace, usually one per asset:
//!
//! - `media/{media_id}/original.{ext}`
//! - `media/{media_id}/medium.jpg`
//! - `media/{media_id}/thumbnail.jpg`
//!
//! Keys are deterministic so storing the same logical object twice overwrites
//! it. Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use factory::create_storage;
pub use folio_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult, StoredObject};
