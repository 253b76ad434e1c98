//! Request references: either a raw content id or a resolvable name, each
//! with an optional forward-slash path inside the addressed content.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash43::TxId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Enumerates supported `ReferenceParseError` values.
pub enum ReferenceParseError {
    #[error("reference cannot be empty")]
    Empty,
    #[error("path must not be absolute or contain empty segments")]
    BadPath,
}

/// The input to the routing pipeline: what the caller wants fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentReference {
    /// A 43-character content id addressing bytes directly.
    Id {
        tx_id: TxId,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// A human-readable name resolved to a content id by the gateway.
    Name {
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
}

impl ContentReference {
    pub fn id(tx_id: TxId) -> Self {
        Self::Id { tx_id, path: None }
    }

    pub fn name(label: impl Into<String>, path: Option<String>) -> Self {
        Self::Name {
            label: label.into(),
            path,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Id { path, .. } | Self::Name { path, .. } => path.as_deref(),
        }
    }

    /// The digest the retrieved bytes must hash to, when the reference pins
    /// one up front. Name lookups and in-content paths are pinned by the
    /// gateway's resolved-id response instead.
    pub fn expected_id(&self) -> Option<TxId> {
        match self {
            Self::Id { tx_id, path: None } => Some(*tx_id),
            _ => None,
        }
    }
}

impl FromStr for ContentReference {
    type Err = ReferenceParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim().trim_start_matches('/');
        if raw.is_empty() {
            return Err(ReferenceParseError::Empty);
        }

        let (head, rest) = match raw.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (raw, None),
        };
        if head.is_empty() {
            return Err(ReferenceParseError::Empty);
        }
        if let Some(path) = rest {
            if path.starts_with('/') || path.split('/').any(str::is_empty) {
                return Err(ReferenceParseError::BadPath);
            }
        }

        if let Ok(tx_id) = head.parse::<TxId>() {
            return Ok(Self::Id {
                tx_id,
                path: rest.map(str::to_string),
            });
        }
        Ok(Self::Name {
            label: head.to_string(),
            path: rest.map(str::to_string),
        })
    }
}

impl fmt::Display for ContentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (head, path) = match self {
            Self::Id { tx_id, path } => (tx_id.to_base64url(), path.as_deref()),
            Self::Name { label, path } => (label.clone(), path.as_deref()),
        };
        match path {
            None => f.write_str(&head),
            Some(path) => write!(f, "{head}/{path}"),
        }
    }
}

/// Reports whether `label` can be served via the gateway subdomain form.
///
/// RFC 1123 label rules: 1-63 characters, alphanumeric or hyphen, no
/// leading or trailing hyphen.
pub fn is_valid_dns_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    let bytes = label.as_bytes();
    if bytes[0] == b'-' || bytes[bytes.len() - 1] == b'-' {
        return false;
    }
    bytes
        .iter()
        .all(|byte| byte.is_ascii_alphanumeric() || *byte == b'-')
}
