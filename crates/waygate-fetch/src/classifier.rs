//! Bundled-item vs transaction classification.
//!
//! A cheap HEAD probe decides which retrieval/verification mode applies to
//! a content id. Verdicts are deterministic for a given gateway view and
//! memoized for the process lifetime.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use waygate_core::TxId;

use crate::contiguous::header_tx_id;
use crate::error::FetchError;
use crate::headers::{HEADER_FETCH_STRATEGY, HEADER_ROOT_TX_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `ItemKind` values.
pub enum ItemKind {
    /// Stored inside a larger root transaction; retrievable via the chunk
    /// API and verified by chunk proofs.
    BundledItem,
    /// A top-level transaction; verified by hashing the whole stream.
    Transaction,
}

/// Public struct `Classifier` used across Waygate components.
#[derive(Debug, Default)]
pub struct Classifier {
    cache: Mutex<HashMap<TxId, ItemKind>>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `tx_id` as served by `origin`. An item is bundled iff the
    /// gateway reports an enclosing root transaction different from the
    /// item itself. Probe failures classify as `Transaction` so retrieval
    /// can proceed contiguously.
    pub async fn classify(
        &self,
        client: &reqwest::Client,
        origin: &str,
        tx_id: TxId,
        cancel: &CancellationToken,
    ) -> Result<ItemKind, FetchError> {
        if let Some(kind) = self.cached(&tx_id) {
            return Ok(kind);
        }

        let url = format!("{}/{tx_id}", origin.trim_end_matches('/'));
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = client
                .head(&url)
                .header(HEADER_FETCH_STRATEGY, "classify")
                .timeout(Duration::from_millis(crate::chunked::CHUNK_FETCH_TIMEOUT_MS))
                .send() => response,
        };

        let kind = match response {
            Ok(response) if response.status().is_success() => {
                match header_tx_id(&response, HEADER_ROOT_TX_ID) {
                    Some(root) if root != tx_id => ItemKind::BundledItem,
                    _ => ItemKind::Transaction,
                }
            }
            Ok(response) => {
                tracing::debug!(url, status = %response.status(), "classify probe rejected");
                ItemKind::Transaction
            }
            Err(error) => {
                tracing::debug!(url, %error, "classify probe failed");
                ItemKind::Transaction
            }
        };

        self.cache
            .lock()
            .expect("classifier cache poisoned")
            .insert(tx_id, kind);
        Ok(kind)
    }

    fn cached(&self, tx_id: &TxId) -> Option<ItemKind> {
        self.cache
            .lock()
            .expect("classifier cache poisoned")
            .get(tx_id)
            .copied()
    }
}
