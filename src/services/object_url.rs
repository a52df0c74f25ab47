//! Transient object URLs for blob payloads
//!
//! Decoding a blob goes through an object URL the same way a browser would.
//! Each URL is owned by an [`ObjectUrl`] guard and is revoked when the guard
//! drops, on success and on failure alike.

use crate::{
    error::{Result, SegmentationError},
    types::EncodedBlob,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

const OBJECT_URL_PREFIX: &str = "blob:bgseg/";

#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    entries: Mutex<HashMap<String, EncodedBlob>>,
}

impl ObjectUrlRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `blob` and return the guard that owns its URL
    pub fn create(self: &Arc<Self>, blob: EncodedBlob) -> Result<ObjectUrl> {
        let url = format!("{}{}", OBJECT_URL_PREFIX, Uuid::new_v4());
        self.entries
            .lock()
            .map_err(|_| SegmentationError::internal("object URL registry lock poisoned"))?
            .insert(url.clone(), blob);
        log::trace!("Created object URL {}", url);
        Ok(ObjectUrl {
            url,
            registry: Arc::clone(self),
        })
    }

    /// Look up the blob behind a live URL
    pub fn resolve(&self, url: &str) -> Result<EncodedBlob> {
        self.entries
            .lock()
            .map_err(|_| SegmentationError::internal("object URL registry lock poisoned"))?
            .get(url)
            .cloned()
            .ok_or_else(|| {
                SegmentationError::invalid_reference(format!("object URL {} is not live", url))
            })
    }

    /// Number of URLs not yet revoked
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    fn revoke(&self, url: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(url);
            log::trace!("Revoked object URL {}", url);
        }
    }
}

/// A live object URL, revoked on drop
#[derive(Debug)]
pub struct ObjectUrl {
    url: String,
    registry: Arc<ObjectUrlRegistry>,
}

impl ObjectUrl {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn resolve(&self) -> Result<EncodedBlob> {
        self.registry.resolve(&self.url)
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}
