//! Verdicts shared by both verification modes.

use thiserror::Error;

use waygate_core::TxId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Enumerates supported `VerifyFailure` values.
pub enum VerifyFailure {
    #[error("digest mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: TxId, actual: TxId },
    #[error("no digest binding available for the requested reference")]
    NoBinding,
    #[error("chunk proof invalid: {0}")]
    ChunkProofInvalid(String),
    #[error("upstream returned status {0}")]
    UpstreamStatus(u16),
    #[error("transport failed mid-stream: {0}")]
    Transport(String),
}

/// The per-request verdict. `Skipped` is the configured bypass, not a
/// failure; strict-mode policy is applied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    Skipped,
    Failed(VerifyFailure),
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }

    /// Human-readable reason for non-verified outcomes.
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Verified => None,
            Self::Skipped => Some("verification disabled".to_string()),
            Self::Failed(failure) => Some(failure.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{VerificationOutcome, VerifyFailure};

    #[test]
    fn reasons_follow_the_verdict() {
        assert!(VerificationOutcome::Verified.is_verified());
        assert_eq!(VerificationOutcome::Verified.reason(), None);
        assert!(!VerificationOutcome::Skipped.is_verified());
        assert!(VerificationOutcome::Skipped.reason().is_some());

        let failed = VerificationOutcome::Failed(VerifyFailure::NoBinding);
        assert!(!failed.is_verified());
        assert!(failed.reason().unwrap().contains("binding"));
    }
}
