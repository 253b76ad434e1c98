//! Content-addressed blob store for verified leaf bytes.
//!
//! Handles are derived from the leaf id, so a leaf referenced under many
//! paths is stored once and rewrites deterministically.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;

use waygate_core::TxId;

/// A handle naming one verified buffer, in the `blob:{id}` form the HTML
/// rewriter embeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobHandle(String);

impl BlobHandle {
    pub fn for_leaf(tx_id: TxId) -> Self {
        Self(format!("blob:{tx_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public struct `BlobStore` used across Waygate components.
#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: Mutex<HashMap<BlobHandle, Bytes>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores verified bytes under their leaf handle.
    pub fn insert(&self, tx_id: TxId, bytes: Bytes) -> BlobHandle {
        let handle = BlobHandle::for_leaf(tx_id);
        self.blobs
            .lock()
            .expect("blob store poisoned")
            .insert(handle.clone(), bytes);
        handle
    }

    pub fn get(&self, handle: &BlobHandle) -> Option<Bytes> {
        self.blobs
            .lock()
            .expect("blob store poisoned")
            .get(handle)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().expect("blob store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every held buffer. Called from the owner's teardown path.
    pub fn release_all(&self) {
        self.blobs.lock().expect("blob store poisoned").clear();
    }
}
