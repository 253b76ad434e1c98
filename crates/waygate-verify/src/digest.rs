//! Incremental digest verification over a retrieval stream.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;

use waygate_core::TxId;

use crate::outcome::{VerificationOutcome, VerifyFailure};

/// Progress granularity: one event per processed MiB.
pub const PROGRESS_STEP_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Progress of one in-flight verification.
pub struct VerificationProgress {
    /// Percent of the expected total, when the total is known.
    pub percentage: Option<f64>,
    pub processed_mb: f64,
    pub total_mb: Option<f64>,
}

pub type ProgressHandler = Arc<dyn Fn(VerificationProgress) + Send + Sync>;

/// Feeds an incremental SHA-256 while bytes flow and settles a verdict at
/// end-of-stream.
pub struct DigestVerifier {
    expected: Option<TxId>,
    hasher: Sha256,
    processed: u64,
    total: Option<u64>,
    next_event_at: u64,
    on_progress: Option<ProgressHandler>,
}

impl DigestVerifier {
    pub fn new(expected: Option<TxId>, total: Option<u64>, on_progress: Option<ProgressHandler>) -> Self {
        Self {
            expected,
            hasher: Sha256::new(),
            processed: 0,
            total,
            next_event_at: PROGRESS_STEP_BYTES,
            on_progress,
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.processed += chunk.len() as u64;
        while self.processed >= self.next_event_at {
            self.emit_progress();
            self.next_event_at += PROGRESS_STEP_BYTES;
        }
    }

    fn emit_progress(&self) {
        if let Some(handler) = &self.on_progress {
            let processed_mb = self.processed as f64 / PROGRESS_STEP_BYTES as f64;
            let total_mb = self
                .total
                .map(|total| total as f64 / PROGRESS_STEP_BYTES as f64);
            let percentage = self.total.filter(|total| *total > 0).map(|total| {
                (self.processed as f64 / total as f64 * 100.0).min(100.0)
            });
            handler(VerificationProgress {
                percentage,
                processed_mb,
                total_mb,
            });
        }
    }

    /// Settles the verdict. Without a binding to check against there is
    /// nothing to verify and the outcome is `NoBinding`.
    pub fn finalize(self) -> VerificationOutcome {
        let Some(expected) = self.expected else {
            return VerificationOutcome::Failed(VerifyFailure::NoBinding);
        };
        let actual = TxId::from_bytes(self.hasher.finalize().into());
        if actual == expected {
            VerificationOutcome::Verified
        } else {
            VerificationOutcome::Failed(VerifyFailure::HashMismatch { expected, actual })
        }
    }
}

/// Wraps a retrieval stream with digest verification.
///
/// Bytes pass through unmodified and in order; nothing is buffered beyond
/// the chunk in flight, so consumer backpressure reaches the underlying
/// HTTP stream directly. The returned receiver resolves exactly once, at
/// end-of-stream: the verdict, or `Transport` when the stream itself
/// failed.
pub fn verify_stream<S, E>(
    upstream: S,
    verifier: DigestVerifier,
) -> (
    impl Stream<Item = Result<Bytes, E>>,
    oneshot::Receiver<VerificationOutcome>,
)
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let (outcome_tx, outcome_rx) = oneshot::channel();

    struct State<S> {
        upstream: S,
        verifier: Option<DigestVerifier>,
        outcome_tx: Option<oneshot::Sender<VerificationOutcome>>,
    }

    let verified = stream::unfold(
        State {
            upstream,
            verifier: Some(verifier),
            outcome_tx: Some(outcome_tx),
        },
        |mut state| async move {
            match state.upstream.next().await {
                Some(Ok(chunk)) => {
                    if let Some(verifier) = state.verifier.as_mut() {
                        verifier.update(&chunk);
                    }
                    Some((Ok(chunk), state))
                }
                Some(Err(error)) => {
                    if state.verifier.take().is_some() {
                        if let Some(sender) = state.outcome_tx.take() {
                            let _ = sender.send(VerificationOutcome::Failed(
                                VerifyFailure::Transport(error.to_string()),
                            ));
                        }
                    }
                    Some((Err(error), state))
                }
                None => {
                    if let Some(verifier) = state.verifier.take() {
                        if let Some(sender) = state.outcome_tx.take() {
                            let _ = sender.send(verifier.finalize());
                        }
                    }
                    None
                }
            }
        },
    );
    (verified, outcome_rx)
}
