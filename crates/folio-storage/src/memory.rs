//! In-memory object store for tests and dry runs

use crate::keys::{object_key, validate_key};
use crate::traits::{Storage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, MemoryObject>>>,
    write_count: Arc<Mutex<usize>>,
    fail_writes_under: Arc<Mutex<Option<String>>>,
    base_url: String,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_base_url("memory://folio")
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Make every write to a key starting with `prefix` fail.
    pub fn fail_writes_under(&self, prefix: &str) {
        if let Ok(mut guard) = self.fail_writes_under.lock() {
            *guard = Some(prefix.to_string());
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn write_count(&self) -> usize {
        self.write_count.lock().map(|c| *c).unwrap_or(0)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .ok()
            .and_then(|o| o.get(key).map(|obj| obj.content_type.clone()))
    }

    fn lock_err<T>(_: T) -> StorageError {
        StorageError::BackendError("memory storage lock poisoned".to_string())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(
        &self,
        data: Bytes,
        logical_name: &str,
        namespace: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let key = object_key(namespace, logical_name)?;

        let failing = self
            .fail_writes_under
            .lock()
            .map_err(Self::lock_err)?
            .clone();
        if let Some(prefix) = failing {
            if key.starts_with(&prefix) {
                return Err(StorageError::UploadFailed(format!(
                    "injected write failure for {}",
                    key
                )));
            }
        }

        self.objects.lock().map_err(Self::lock_err)?.insert(
            key.clone(),
            MemoryObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        *self.write_count.lock().map_err(Self::lock_err)? += 1;

        let url = self.public_url(&key);
        Ok(StoredObject { key, url })
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Bytes> {
        validate_key(storage_key)?;
        self.objects
            .lock()
            .map_err(Self::lock_err)?
            .get(storage_key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self
            .objects
            .lock()
            .map_err(Self::lock_err)?
            .contains_key(storage_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.objects
            .lock()
            .map_err(Self::lock_err)?
            .remove(storage_key);
        Ok(())
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", self.base_url, storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
