//! Object storage for uploaded session files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::{debug, instrument};

use confab_core::store::ObjectStore;
use confab_core::{CoreError, UserId};

use crate::error::StoreError;

/// `{owner}/{external_id}/{path}` with the client-supplied parts
/// percent-encoded, so a key is always exactly three flat segments.
pub fn object_key(owner: &UserId, external_id: &str, path: &str) -> String {
    format!(
        "{}/{}/{}",
        owner.as_str(),
        utf8_percent_encode(external_id, NON_ALPHANUMERIC),
        utf8_percent_encode(path, NON_ALPHANUMERIC)
    )
}

/// Files under a root directory, one file per key.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        tokio::fs::read(self.root.join(key)).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(format!("object {key}")),
            _ => StoreError::Io(e.to_string()),
        })
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    #[instrument(skip(self, bytes), fields(user_id = %owner, size = bytes.len()))]
    async fn put(
        &self,
        owner: &UserId,
        external_id: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<String, CoreError> {
        let key = object_key(owner, external_id, path);
        let target = self.root.join(&key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
        }
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| StoreError::Io(format!("write object: {e}")))?;
        debug!(key = %key, "object stored");
        Ok(key)
    }
}

/// In-process object store for tests and throwaway servers.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        owner: &UserId,
        external_id: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<String, CoreError> {
        let key = object_key(owner, external_id, path);
        self.objects.lock().insert(key.clone(), bytes);
        Ok(key)
    }
}
