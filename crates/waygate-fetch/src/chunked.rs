//! Chunked retrieval for bundled items.
//!
//! Walks the gateway's per-chunk API: locate the enclosing root
//! transaction, compute the item's absolute offsets, then pull chunks in
//! strictly ascending order. Each chunk's Merkle proof is validated before
//! any of its bytes are emitted.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{stream, StreamExt};
use reqwest::header::CONTENT_LENGTH;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use waygate_core::TxId;
use waygate_verify::validate_chunk;

use crate::contiguous::{header_tx_id, header_u64};
use crate::error::FetchError;
use crate::headers::{
    HEADER_CHUNK_DATA_PATH, HEADER_CHUNK_READ_OFFSET, HEADER_CHUNK_START_OFFSET,
    HEADER_CHUNK_TX_ID, HEADER_FETCH_STRATEGY, HEADER_ROOT_DATA_OFFSET, HEADER_ROOT_TX_ID,
};

/// Budget per chunk request.
pub const CHUNK_FETCH_TIMEOUT_MS: u64 = 10_000;

/// A located bundled item with its lazily walked byte stream.
pub struct ChunkedItem {
    pub root_tx_id: TxId,
    pub item_len: u64,
    /// Absolute offset of the item's first byte in the weave.
    pub item_start_abs: u64,
    /// Absolute offset of the root transaction's first data byte.
    pub root_start_abs: u64,
    /// Total data length of the root transaction.
    pub root_size: u64,
    pub stream: BoxStream<'static, Result<Bytes, FetchError>>,
}

/// `/tx/{id}/offset` payload. Live gateways serialize these as decimal
/// strings; either form is accepted.
#[derive(Debug, Deserialize)]
struct TxOffsetResponse {
    offset: NumberOrString,
    size: NumberOrString,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn value(&self) -> Result<u64, FetchError> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::String(raw) => raw
                .trim()
                .parse()
                .map_err(|_| FetchError::Protocol(format!("non-numeric offset field '{raw}'"))),
        }
    }
}

/// Locates `tx_id` inside its root transaction and returns the chunk walk.
///
/// Fails with `ChunkApiUnavailable` when the gateway does not expose the
/// chunk surface for this item; callers fall back to contiguous retrieval
/// for the request.
pub async fn fetch_chunked(
    client: &reqwest::Client,
    origin: &str,
    tx_id: TxId,
    verify_proofs: bool,
    cancel: &CancellationToken,
) -> Result<ChunkedItem, FetchError> {
    let origin = origin.trim_end_matches('/').to_string();

    let head_url = format!("{origin}/{tx_id}");
    let head = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        response = client
            .head(&head_url)
            .header(HEADER_FETCH_STRATEGY, "chunked")
            .timeout(Duration::from_millis(CHUNK_FETCH_TIMEOUT_MS))
            .send() => response?,
    };
    if !head.status().is_success() {
        return Err(FetchError::UpstreamStatus {
            status: head.status().as_u16(),
            url: head_url,
        });
    }

    let root_tx_id = header_tx_id(&head, HEADER_ROOT_TX_ID).ok_or_else(|| {
        FetchError::ChunkApiUnavailable("missing or invalid root tx id header".to_string())
    })?;
    let root_data_offset = header_u64(&head, HEADER_ROOT_DATA_OFFSET).ok_or_else(|| {
        FetchError::ChunkApiUnavailable("missing or invalid root data offset header".to_string())
    })?;
    let item_len = head
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            FetchError::ChunkApiUnavailable("missing content length for bundled item".to_string())
        })?;

    let offset_url = format!("{origin}/tx/{root_tx_id}/offset");
    let offset_response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        response = client
            .get(&offset_url)
            .timeout(Duration::from_millis(CHUNK_FETCH_TIMEOUT_MS))
            .send() => response?,
    };
    if !offset_response.status().is_success() {
        return Err(FetchError::UpstreamStatus {
            status: offset_response.status().as_u16(),
            url: offset_url,
        });
    }
    let located: TxOffsetResponse = offset_response.json().await?;
    let root_end_abs = located.offset.value()?;
    let root_size = located.size.value()?;
    if root_size == 0 || root_end_abs + 1 < root_size {
        return Err(FetchError::Protocol(format!(
            "implausible root span: end {root_end_abs}, size {root_size}"
        )));
    }
    let root_start_abs = root_end_abs - root_size + 1;
    if root_data_offset.saturating_add(item_len) > root_size {
        return Err(FetchError::Protocol(format!(
            "item (offset {root_data_offset}, len {item_len}) exceeds root size {root_size}"
        )));
    }
    let item_start_abs = root_start_abs + root_data_offset;

    tracing::debug!(
        %tx_id,
        root = %root_tx_id,
        item_len,
        item_start_abs,
        "chunk walk located bundled item"
    );

    let walk = ChunkWalk {
        client: client.clone(),
        origin,
        root_tx_id,
        root_start_abs,
        root_size,
        next_abs: item_start_abs,
        remaining: item_len,
        verify_proofs,
        cancel: cancel.clone(),
    };
    let stream = stream::unfold(Some(walk), |state| async move {
        let mut walk = state?;
        if walk.remaining == 0 {
            return None;
        }
        if walk.cancel.is_cancelled() {
            return Some((Err(FetchError::Cancelled), None));
        }
        match walk.step().await {
            Ok(chunk) => Some((Ok(chunk), Some(walk))),
            Err(error) => Some((Err(error), None)),
        }
    })
    .boxed();

    Ok(ChunkedItem {
        root_tx_id,
        item_len,
        item_start_abs,
        root_start_abs,
        root_size,
        stream,
    })
}

struct ChunkWalk {
    client: reqwest::Client,
    origin: String,
    root_tx_id: TxId,
    root_start_abs: u64,
    root_size: u64,
    next_abs: u64,
    remaining: u64,
    verify_proofs: bool,
    cancel: CancellationToken,
}

impl ChunkWalk {
    /// Fetches and validates the chunk covering `next_abs`, returning the
    /// readable slice and advancing to the following chunk.
    async fn step(&mut self) -> Result<Bytes, FetchError> {
        let chunk_url = format!("{}/chunk/{}/data", self.origin, self.next_abs);
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            response = self
                .client
                .get(&chunk_url)
                .header(HEADER_FETCH_STRATEGY, "chunked")
                .timeout(Duration::from_millis(CHUNK_FETCH_TIMEOUT_MS))
                .send() => response?,
        };
        if !response.status().is_success() {
            return Err(FetchError::UpstreamStatus {
                status: response.status().as_u16(),
                url: chunk_url,
            });
        }

        let chunk_tx_id = header_tx_id(&response, HEADER_CHUNK_TX_ID)
            .ok_or_else(|| FetchError::Protocol("missing chunk tx id header".to_string()))?;
        if chunk_tx_id != self.root_tx_id {
            return Err(FetchError::ChunkTxIdMismatch {
                expected: self.root_tx_id,
                actual: chunk_tx_id,
            });
        }
        let start_abs = header_u64(&response, HEADER_CHUNK_START_OFFSET)
            .ok_or_else(|| FetchError::Protocol("missing chunk start offset".to_string()))?;
        let read_offset = header_u64(&response, HEADER_CHUNK_READ_OFFSET)
            .ok_or_else(|| FetchError::Protocol("missing chunk read offset".to_string()))?;
        let data_path = response
            .headers()
            .get(HEADER_CHUNK_DATA_PATH)
            .and_then(|value| value.to_str().ok())
            .map(|raw| {
                URL_SAFE_NO_PAD
                    .decode(raw.trim())
                    .map_err(|_| FetchError::ChunkProofInvalid("undecodable data path".to_string()))
            })
            .transpose()?;

        let data = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            data = response.bytes() => data?,
        };

        // The chunk must cover the offset we asked for; anything else would
        // reorder or stall the walk.
        let end_abs = start_abs + data.len() as u64;
        if start_abs > self.next_abs || end_abs <= self.next_abs {
            return Err(FetchError::Protocol(format!(
                "chunk [{start_abs}, {end_abs}) does not cover offset {}",
                self.next_abs
            )));
        }
        let expected_read = self.next_abs - start_abs;
        if read_offset != expected_read {
            return Err(FetchError::Protocol(format!(
                "read offset {read_offset} disagrees with computed {expected_read}"
            )));
        }

        if self.verify_proofs {
            let path = data_path.as_deref().ok_or_else(|| {
                FetchError::ChunkProofInvalid("gateway sent no proof for chunk".to_string())
            })?;
            let rel_dest = self.next_abs - self.root_start_abs;
            let validation = validate_chunk(
                self.root_tx_id.as_bytes(),
                rel_dest,
                self.root_size,
                &data,
                path,
            )
            .map_err(|failure| FetchError::ChunkProofInvalid(failure.to_string()))?;
            let rel_start = start_abs - self.root_start_abs;
            if validation.left_bound != rel_start {
                return Err(FetchError::ChunkProofInvalid(format!(
                    "proof covers offset {} but chunk claims {}",
                    validation.left_bound, rel_start
                )));
            }
        }

        let available = data.len() as u64 - expected_read;
        let take = available.min(self.remaining);
        let slice = data.slice(expected_read as usize..(expected_read + take) as usize);
        self.remaining -= take;
        self.next_abs = end_abs;
        Ok(slice)
    }
}
