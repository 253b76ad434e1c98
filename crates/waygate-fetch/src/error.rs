use thiserror::Error;

use waygate_core::TxId;

#[derive(Debug, Error)]
/// Enumerates supported `FetchError` values.
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chunk api unavailable: {0}")]
    ChunkApiUnavailable(String),
    #[error("chunk tx id mismatch: expected {expected}, got {actual}")]
    ChunkTxIdMismatch { expected: TxId, actual: TxId },
    #[error("chunk proof invalid: {0}")]
    ChunkProofInvalid(String),
    #[error("gateway answered {status} for {url}")]
    UpstreamStatus { status: u16, url: String },
    #[error("chunk protocol violation: {0}")]
    Protocol(String),
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether a different gateway pick could plausibly succeed. Proof and
    /// digest failures are cryptographic hard stops and never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::UpstreamStatus { .. } | Self::ChunkApiUnavailable(_) => true,
            Self::ChunkTxIdMismatch { .. }
            | Self::ChunkProofInvalid(_)
            | Self::Protocol(_)
            | Self::Cancelled => false,
        }
    }
}
