//! Content-id codec: 32-byte digests encoded as 43 characters of
//! URL-safe base64 without padding.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Encoded length of a 32-byte digest in unpadded base64url.
pub const TX_ID_ENCODED_LEN: usize = 43;

/// Decoded digest length in bytes.
pub const TX_ID_LEN: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Enumerates supported `Hash43ParseError` values.
pub enum Hash43ParseError {
    #[error("content id must be {TX_ID_ENCODED_LEN} characters, got {0}")]
    BadLength(usize),
    #[error("content id contains characters outside the base64url alphabet")]
    BadAlphabet,
    #[error("content id does not decode to {TX_ID_LEN} bytes")]
    BadDecode,
}

/// A 32-byte content digest addressing one transaction or bundled item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId([u8; TX_ID_LEN]);

impl TxId {
    pub fn from_bytes(bytes: [u8; TX_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TX_ID_LEN] {
        &self.0
    }

    /// Renders the canonical 43-character base64url form.
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl FromStr for TxId {
    type Err = Hash43ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.len() != TX_ID_ENCODED_LEN {
            return Err(Hash43ParseError::BadLength(raw.len()));
        }
        if !raw.bytes().all(is_base64url_byte) {
            return Err(Hash43ParseError::BadAlphabet);
        }
        let decoded = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| Hash43ParseError::BadDecode)?;
        let bytes: [u8; TX_ID_LEN] = decoded
            .try_into()
            .map_err(|_| Hash43ParseError::BadDecode)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64url())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn is_base64url_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

/// Reports whether `segment` is shaped like an encoded content id.
///
/// This is the heuristic used to decide whether a URL already points at
/// addressed content. It is approximate: any 43-character token drawn from
/// the base64url alphabet matches, including tokens that were never content
/// ids. Callers must treat a `true` as "plausibly addressed", not proof.
pub fn looks_like_tx_id_segment(segment: &str) -> bool {
    segment.len() == TX_ID_ENCODED_LEN && segment.bytes().all(is_base64url_byte)
}
