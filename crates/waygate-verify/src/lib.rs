//! Verification discipline for retrieved byte streams.
//!
//! Contiguous retrievals are verified by an incremental digest over the
//! whole stream; bundled items are verified chunk-by-chunk against a Merkle
//! path rooted in the enclosing transaction. Either way the caller gets the
//! bytes in network order plus a definite verdict at end-of-stream.

mod digest;
mod merkle;
mod outcome;

pub use digest::{
    verify_stream, DigestVerifier, ProgressHandler, VerificationProgress, PROGRESS_STEP_BYTES,
};
pub use merkle::{validate_chunk, validate_path, PathValidation, HASH_SIZE, NOTE_SIZE};
pub use outcome::{VerificationOutcome, VerifyFailure};
