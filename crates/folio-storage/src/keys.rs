//! Shared key generation for storage backends.

use uuid::Uuid;

use crate::{StorageError, StorageResult};

/// Namespace holding every object derived from one asset.
pub fn media_namespace(media_id: Uuid) -> String {
    format!("media/{}", media_id)
}

/// Join a namespace and logical name into a storage key, rejecting traversal.
pub fn object_key(namespace: &str, logical_name: &str) -> StorageResult<String> {
    let namespace = namespace.trim_matches('/');
    let logical_name = logical_name.trim_start_matches('/');

    if logical_name.is_empty() {
        return Err(StorageError::InvalidKey(
            "Logical name cannot be empty".to_string(),
        ));
    }

    let key = if namespace.is_empty() {
        logical_name.to_string()
    } else {
        format!("{}/{}", namespace, logical_name)
    };

    validate_key(&key)?;
    Ok(key)
}

pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            key
        )));
    }
    if key.contains('\0') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_key_is_deterministic() {
        let id = Uuid::new_v4();
        let ns = media_namespace(id);
        assert_eq!(
            object_key(&ns, "medium.jpg").unwrap(),
            format!("media/{}/medium.jpg", id)
        );
        assert_eq!(
            object_key(&ns, "medium.jpg").unwrap(),
            object_key(&format!("{}/", ns), "/medium.jpg").unwrap()
        );
    }

    #[test]
    fn traversal_is_rejected() {
        assert!(object_key("media", "../etc/passwd").is_err());
        assert!(object_key("media/../..", "x.jpg").is_err());
        assert!(object_key("media", "").is_err());
        assert!(validate_key("/abs/path").is_err());
    }
}
