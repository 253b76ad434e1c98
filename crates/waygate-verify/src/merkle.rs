//! Merkle path validation for chunked retrieval.
//!
//! A proof is a walk from the root to one leaf. Branch records are
//! `left(32) ‖ right(32) ‖ note(32)`, the leaf record is
//! `data_hash(32) ‖ note(32)`; every node id is the SHA-256 of the SHA-256s
//! of its parts, and notes are big-endian byte offsets bounding the leaf.

use sha2::{Digest, Sha256};

use crate::outcome::VerifyFailure;

pub const HASH_SIZE: usize = 32;
pub const NOTE_SIZE: usize = 32;

const BRANCH_RECORD_LEN: usize = 2 * HASH_SIZE + NOTE_SIZE;
const LEAF_RECORD_LEN: usize = HASH_SIZE + NOTE_SIZE;

/// Maximum nesting the validator will walk. Deeper proofs are rejected as
/// malformed rather than recursed into.
const MAX_PATH_DEPTH: usize = 64;

/// A successfully validated leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathValidation {
    /// SHA-256 of the leaf's chunk bytes, as committed by the proof.
    pub data_hash: [u8; HASH_SIZE],
    /// First byte offset covered by the leaf (inclusive).
    pub left_bound: u64,
    /// One past the last byte offset covered by the leaf.
    pub right_bound: u64,
}

fn hash_parts(parts: &[&[u8]]) -> [u8; HASH_SIZE] {
    let mut outer = Sha256::new();
    for part in parts {
        outer.update(Sha256::digest(part));
    }
    outer.finalize().into()
}

fn note_to_offset(note: &[u8]) -> Result<u64, VerifyFailure> {
    let (high, low) = note.split_at(NOTE_SIZE - 8);
    if high.iter().any(|byte| *byte != 0) {
        return Err(VerifyFailure::ChunkProofInvalid(
            "offset note exceeds the supported range".to_string(),
        ));
    }
    Ok(u64::from_be_bytes(low.try_into().expect("8-byte slice")))
}

/// Walks `path` from `root` down to the leaf covering `dest_offset`.
///
/// `right_bound` is the exclusive upper bound of the root's data span;
/// offsets and intermediate notes are clamped against it exactly as the
/// tree builder clamps them.
pub fn validate_path(
    root: &[u8; HASH_SIZE],
    dest_offset: u64,
    right_bound: u64,
    path: &[u8],
) -> Result<PathValidation, VerifyFailure> {
    if right_bound == 0 {
        return Err(VerifyFailure::ChunkProofInvalid(
            "empty data span".to_string(),
        ));
    }
    let dest_offset = dest_offset.min(right_bound - 1);

    let mut expected = *root;
    let mut left_bound: u64 = 0;
    let mut right_bound = right_bound;
    let mut remaining = path;

    for _ in 0..MAX_PATH_DEPTH {
        if remaining.len() == LEAF_RECORD_LEN {
            let (data_hash, note) = remaining.split_at(HASH_SIZE);
            let id = hash_parts(&[data_hash, note]);
            if id != expected {
                return Err(VerifyFailure::ChunkProofInvalid(
                    "leaf hash does not match the expected node".to_string(),
                ));
            }
            let note_offset = note_to_offset(note)?.min(right_bound);
            if dest_offset < left_bound || dest_offset >= note_offset {
                return Err(VerifyFailure::ChunkProofInvalid(
                    "leaf bounds do not cover the requested offset".to_string(),
                ));
            }
            return Ok(PathValidation {
                data_hash: data_hash.try_into().expect("32-byte slice"),
                left_bound,
                right_bound: note_offset,
            });
        }

        if remaining.len() < BRANCH_RECORD_LEN {
            return Err(VerifyFailure::ChunkProofInvalid(
                "truncated proof path".to_string(),
            ));
        }
        let (record, rest) = remaining.split_at(BRANCH_RECORD_LEN);
        let left = &record[..HASH_SIZE];
        let right = &record[HASH_SIZE..2 * HASH_SIZE];
        let note = &record[2 * HASH_SIZE..];

        let id = hash_parts(&[left, right, note]);
        if id != expected {
            return Err(VerifyFailure::ChunkProofInvalid(
                "branch hash does not match the expected node".to_string(),
            ));
        }

        let split = note_to_offset(note)?.min(right_bound);
        if dest_offset < split {
            expected = left.try_into().expect("32-byte slice");
            right_bound = split;
        } else {
            expected = right.try_into().expect("32-byte slice");
            left_bound = split;
        }
        remaining = rest;
    }

    Err(VerifyFailure::ChunkProofInvalid(
        "proof path is too deep".to_string(),
    ))
}

/// Validates one chunk: the proof must walk from `root` to a leaf covering
/// `dest_offset`, and the chunk bytes must hash to the committed data hash.
pub fn validate_chunk(
    root: &[u8; HASH_SIZE],
    dest_offset: u64,
    right_bound: u64,
    data: &[u8],
    path: &[u8],
) -> Result<PathValidation, VerifyFailure> {
    let validation = validate_path(root, dest_offset, right_bound, path)?;
    let data_hash: [u8; HASH_SIZE] = Sha256::digest(data).into();
    if data_hash != validation.data_hash {
        return Err(VerifyFailure::ChunkProofInvalid(
            "chunk bytes do not match the committed data hash".to_string(),
        ));
    }
    let span = (validation.right_bound - validation.left_bound) as usize;
    if data.len() != span {
        return Err(VerifyFailure::ChunkProofInvalid(format!(
            "chunk length {} does not match the proven span {}",
            data.len(),
            span
        )));
    }
    Ok(validation)
}
