//! Path-manifest parsing and recovery.
//!
//! Manifest-ness is decided by content inspection: a payload is a manifest
//! iff it parses as JSON carrying the path-manifest schema tag, whatever
//! the transport said in `Content-Type`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use waygate_core::TxId;

/// Schema tag carried in the manifest's `manifest` field.
pub const MANIFEST_SCHEMA: &str = "arweave/paths";

pub const SUPPORTED_VERSIONS: [&str; 2] = ["0.1.0", "0.2.0"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("manifest invalid: {0}")]
pub struct ManifestError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `ManifestEntry` used across Waygate components.
pub struct ManifestEntry {
    pub id: TxId,
}

/// The manifest's default document: a path into `paths`, or (in degenerate
/// manifests) a direct id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManifestIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TxId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `Manifest` used across Waygate components.
pub struct Manifest {
    #[serde(rename = "manifest")]
    pub schema: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<ManifestIndex>,
    pub paths: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Unique leaf ids across all paths.
    pub fn unique_leaves(&self) -> Vec<TxId> {
        let mut seen = std::collections::BTreeSet::new();
        self.paths
            .values()
            .filter(|entry| seen.insert(entry.id))
            .map(|entry| entry.id)
            .collect()
    }

    /// The id behind `index.path`, when both resolve.
    pub fn index_leaf(&self) -> Option<TxId> {
        let index = self.index.as_ref()?;
        if let Some(path) = &index.path {
            return self.paths.get(path).map(|entry| entry.id);
        }
        index.id
    }
}

/// A parse result, possibly reduced by recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `ParsedManifest` used across Waygate components.
pub struct ParsedManifest {
    pub manifest: Manifest,
    /// Paths dropped because their entries were unusable.
    pub recovered: Vec<String>,
}

impl ParsedManifest {
    /// A degenerate manifest that kept no paths but still names an index
    /// id is served as a single-item retrieval.
    pub fn index_only(&self) -> Option<TxId> {
        if !self.manifest.paths.is_empty() {
            return None;
        }
        self.manifest.index.as_ref()?.id
    }
}

/// Content inspection: does this payload carry the path-manifest schema?
pub fn is_manifest_payload(bytes: &[u8]) -> bool {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) else {
        return false;
    };
    value
        .get("manifest")
        .and_then(|tag| tag.as_str())
        .is_some_and(|tag| tag == MANIFEST_SCHEMA)
}

/// Parses a manifest payload, recovering what it can.
///
/// Unusable `paths` entries (non-object, missing id, malformed id,
/// absolute path) are dropped and reported in `recovered`. An index path
/// pointing at a dropped or absent entry degrades to the index id when one
/// is present, otherwise the index is dropped too.
pub fn parse_manifest(bytes: &[u8]) -> Result<ParsedManifest, ManifestError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|error| ManifestError(format!("payload is not JSON: {error}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| ManifestError("payload is not a JSON object".to_string()))?;

    let schema = object
        .get("manifest")
        .and_then(|tag| tag.as_str())
        .ok_or_else(|| ManifestError("missing schema tag".to_string()))?;
    if schema != MANIFEST_SCHEMA {
        return Err(ManifestError(format!("unsupported schema '{schema}'")));
    }
    let version = object
        .get("version")
        .and_then(|version| version.as_str())
        .ok_or_else(|| ManifestError("missing version".to_string()))?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(ManifestError(format!("unsupported version '{version}'")));
    }
    let raw_paths = object
        .get("paths")
        .and_then(|paths| paths.as_object())
        .ok_or_else(|| ManifestError("missing paths map".to_string()))?;

    let mut paths = BTreeMap::new();
    let mut recovered = Vec::new();
    for (path, entry) in raw_paths {
        let id = entry
            .get("id")
            .and_then(|id| id.as_str())
            .and_then(|raw| raw.parse::<TxId>().ok());
        let usable = !path.starts_with('/') && !path.is_empty();
        match id {
            Some(id) if usable => {
                paths.insert(path.clone(), ManifestEntry { id });
            }
            _ => recovered.push(path.clone()),
        }
    }

    let mut index = object
        .get("index")
        .and_then(|index| serde_json::from_value::<ManifestIndex>(index.clone()).ok());
    if let Some(candidate) = index.take() {
        let path_resolves = candidate
            .path
            .as_ref()
            .is_some_and(|path| paths.contains_key(path));
        index = if path_resolves {
            Some(candidate)
        } else if candidate.id.is_some() {
            // The path entry was dropped or absent; fall back to the
            // direct id binding.
            Some(ManifestIndex {
                path: None,
                id: candidate.id,
            })
        } else {
            if let Some(path) = &candidate.path {
                recovered.push(format!("index:{path}"));
            }
            None
        };
    }

    if paths.is_empty() && !recovered.is_empty() && index.as_ref().and_then(|i| i.id).is_none() {
        return Err(ManifestError(
            "no usable path entries survived recovery".to_string(),
        ));
    }

    if !recovered.is_empty() {
        tracing::debug!(dropped = recovered.len(), "manifest recovered partially");
    }

    Ok(ParsedManifest {
        manifest: Manifest {
            schema: schema.to_string(),
            version: version.to_string(),
            index,
            paths,
        },
        recovered,
    })
}
