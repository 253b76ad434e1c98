//! Contiguous retrieval: one GET, body surfaced as a lazy byte stream.

use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;

use waygate_core::TxId;

use crate::error::FetchError;
use crate::headers::{
    HEADER_FETCH_STRATEGY, HEADER_RESOLVED_ID, HEADER_ROOT_DATA_OFFSET, HEADER_ROOT_TX_ID,
};

/// Whole-artifact budget for a contiguous fetch.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 60_000;

/// A streamed gateway response. Non-2xx answers are surfaced as-is; the
/// verification layer downgrades them.
impl std::fmt::Debug for ContiguousResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContiguousResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("resolved_id", &self.resolved_id)
            .field("root_tx_id", &self.root_tx_id)
            .field("root_data_offset", &self.root_data_offset)
            .finish_non_exhaustive()
    }
}

pub struct ContiguousResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Digest binding resolved by the gateway for names and in-content
    /// paths.
    pub resolved_id: Option<TxId>,
    /// Present when the content is a bundled item reachable through the
    /// chunk API.
    pub root_tx_id: Option<TxId>,
    pub root_data_offset: Option<u64>,
    pub stream: BoxStream<'static, Result<Bytes, FetchError>>,
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub(crate) fn header_tx_id(response: &reqwest::Response, name: &str) -> Option<TxId> {
    header_string(response, name).and_then(|raw| raw.parse().ok())
}

pub(crate) fn header_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    header_string(response, name).and_then(|raw| raw.trim().parse().ok())
}

/// Issues the GET and hands back the streaming response.
///
/// The request carries a diagnostic strategy header. Cancellation closes
/// the in-flight body stream at the next chunk boundary.
pub async fn fetch_contiguous(
    client: &reqwest::Client,
    url: &str,
    timeout_ms: u64,
    cancel: &CancellationToken,
) -> Result<ContiguousResponse, FetchError> {
    let request = client
        .get(url)
        .header(HEADER_FETCH_STRATEGY, "contiguous")
        .timeout(Duration::from_millis(timeout_ms.max(1)));

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        response = request.send() => response?,
    };

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let content_length = response.content_length();
    let resolved_id = header_tx_id(&response, HEADER_RESOLVED_ID);
    let root_tx_id = header_tx_id(&response, HEADER_ROOT_TX_ID);
    let root_data_offset = header_u64(&response, HEADER_ROOT_DATA_OFFSET);

    tracing::debug!(url, status, content_length, "contiguous fetch started");

    let body = response.bytes_stream().map(|item| item.map_err(FetchError::Http));
    let stream = cancellable(body, cancel.clone()).boxed();

    Ok(ContiguousResponse {
        status,
        content_type,
        content_length,
        resolved_id,
        root_tx_id,
        root_data_offset,
        stream,
    })
}

/// Ends a byte stream early (with a terminal `Cancelled` item) once the
/// token fires. No further bytes are pulled from the inner stream.
pub(crate) fn cancellable<S>(
    inner: S,
    cancel: CancellationToken,
) -> impl futures_util::Stream<Item = Result<Bytes, FetchError>>
where
    S: futures_util::Stream<Item = Result<Bytes, FetchError>> + Unpin + Send + 'static,
{
    stream::unfold(Some((inner, cancel)), |state| async move {
        let (mut inner, cancel) = state?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Some((Err(FetchError::Cancelled), None)),
            item = inner.next() => item.map(|item| (item, Some((inner, cancel)))),
        }
    })
}
