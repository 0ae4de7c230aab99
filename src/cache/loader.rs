//! Key retrieval backends
//!
//! The cache delegates loading to a [`KeyLoader`]; the daemon ships with a
//! filesystem backend.

use std::fs;
use std::path::PathBuf;

use crate::buffer::{KeyId, SecretBuffer};
use crate::error::{KeywardError, Result};

/// Resolves a key identifier to key material
pub trait KeyLoader: Send + Sync {
    fn load_key(&self, id: &KeyId) -> Result<SecretBuffer>;
}

/// Loads raw key bytes from `file:` identifiers.
///
/// Accepted forms: `file:/abs/path` and `file:///abs/path`.
#[derive(Debug, Clone, Default)]
pub struct FileKeyLoader;

impl FileKeyLoader {
    /// Largest key file accepted (bytes)
    pub const MAX_KEY_SIZE: u64 = 4096;

    pub fn new() -> Self {
        Self
    }

    /// Map an identifier to an absolute filesystem path
    pub fn resolve(id: &KeyId) -> Result<PathBuf> {
        let text = id
            .as_str()
            .ok_or_else(|| KeywardError::KeyLoad("identifier is not valid UTF-8".into()))?;

        let path = if let Some(rest) = text.strip_prefix("file://") {
            rest
        } else if let Some(rest) = text.strip_prefix("file:") {
            rest
        } else {
            return Err(KeywardError::KeyLoad(format!(
                "unsupported identifier scheme: {}",
                text
            )));
        };

        if !path.starts_with('/') {
            return Err(KeywardError::KeyLoad(format!(
                "key path must be absolute: {}",
                text
            )));
        }

        Ok(PathBuf::from(path))
    }
}

impl KeyLoader for FileKeyLoader {
    fn load_key(&self, id: &KeyId) -> Result<SecretBuffer> {
        let path = Self::resolve(id)?;

        let metadata = fs::metadata(&path)
            .map_err(|e| KeywardError::KeyLoad(format!("{}: {}", path.display(), e)))?;

        if !metadata.is_file() {
            return Err(KeywardError::KeyLoad(format!(
                "{}: not a regular file",
                path.display()
            )));
        }
        if metadata.len() == 0 {
            return Err(KeywardError::KeyLoad(format!("{}: empty key file", path.display())));
        }
        if metadata.len() > Self::MAX_KEY_SIZE {
            return Err(KeywardError::KeyLoad(format!(
                "{}: key file too large ({} bytes, max {})",
                path.display(),
                metadata.len(),
                Self::MAX_KEY_SIZE
            )));
        }

        let bytes = fs::read(&path)
            .map_err(|e| KeywardError::KeyLoad(format!("{}: {}", path.display(), e)))?;

        Ok(SecretBuffer::new(bytes))
    }
}
