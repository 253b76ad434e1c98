//! Manifest fan-out: verify every leaf, collect the trust report, rewrite
//! the index document.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use waygate_core::TxId;
use waygate_verify::VerificationOutcome;

use crate::blob::{BlobHandle, BlobStore};
use crate::plan::{plan_manifest, LoadingStrategy, LEAF_BATCH_DELAY_MS, LEAF_BATCH_SIZE};
use crate::rewrite::rewrite_html;
use crate::schema::{parse_manifest, ManifestError, ParsedManifest};

/// One verified (or failed) leaf retrieval.
pub struct VerifiedLeaf {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub outcome: VerificationOutcome,
}

#[async_trait]
/// Trait contract for `LeafFetcher` behavior.
///
/// Implemented by the client over the full router→retriever→verifier
/// stack. Failures are encoded in the returned outcome so sibling leaves
/// keep loading.
pub trait LeafFetcher: Send + Sync {
    async fn fetch_leaf(&self, tx_id: TxId) -> VerifiedLeaf;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ResourceStatus` values.
pub enum ResourceStatus {
    Verified,
    Skipped,
    Failed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Public struct `ResourceReport` used across Waygate components.
pub struct ResourceReport {
    pub reference: String,
    pub status: ResourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// Public struct `TrustReport` used across Waygate components.
pub struct TrustReport {
    pub total: usize,
    pub verified: usize,
    pub skipped: usize,
    pub failed: usize,
    pub per_resource: Vec<ResourceReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl TrustReport {
    pub fn push(&mut self, entry: ResourceReport) {
        self.total += 1;
        match entry.status {
            ResourceStatus::Verified => self.verified += 1,
            ResourceStatus::Skipped => self.skipped += 1,
            ResourceStatus::Failed => self.failed += 1,
            ResourceStatus::Pending => {}
        }
        self.per_resource.push(entry);
    }

    /// Single-resource report for non-manifest artifacts.
    pub fn single(reference: impl Into<String>, outcome: &VerificationOutcome) -> Self {
        let mut report = Self::default();
        report.push(ResourceReport {
            reference: reference.into(),
            status: status_for(outcome),
            reason: outcome.reason(),
        });
        report
    }
}

fn status_for(outcome: &VerificationOutcome) -> ResourceStatus {
    match outcome {
        VerificationOutcome::Verified => ResourceStatus::Verified,
        VerificationOutcome::Skipped => ResourceStatus::Skipped,
        VerificationOutcome::Failed(_) => ResourceStatus::Failed,
    }
}

/// Per-leaf progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafProgress {
    pub reference: String,
    pub status: ResourceStatus,
    pub reason: Option<String>,
}

pub type LeafProgressSink = Arc<dyn Fn(LeafProgress) + Send + Sync>;

#[async_trait]
/// Trait contract for `ContinuationPrompt` behavior.
///
/// Consulted once per progressive render after the critical set settles.
pub trait ContinuationPrompt: Send + Sync {
    async fn continue_after_critical(&self, remaining: usize) -> bool;
}

/// Options for one render run.
#[derive(Default)]
pub struct RenderOptions {
    pub on_progress: Option<LeafProgressSink>,
    /// Progressive-strategy choice point; absent means continue.
    pub continuation: Option<Arc<dyn ContinuationPrompt>>,
    pub cancel: CancellationToken,
}

/// The rewritten composite artifact.
pub struct RenderedManifest {
    pub report: TrustReport,
    /// Rewritten index document, when the index leaf verified as HTML.
    pub html: Option<String>,
    pub index_handle: Option<BlobHandle>,
    /// True iff every leaf in the chosen strategy's completion set
    /// verified.
    pub verified: bool,
}

enum LeafResult {
    Fetched {
        outcome: VerificationOutcome,
        content_type: Option<String>,
    },
    NotAttempted,
}

/// Parses and renders a manifest payload through `fetcher`.
///
/// Leaf failures never abort siblings; cancellation stops scheduling new
/// work and reports the remainder as skipped.
pub async fn render_manifest(
    fetcher: &dyn LeafFetcher,
    manifest_bytes: &[u8],
    blobs: &BlobStore,
    options: &RenderOptions,
) -> Result<RenderedManifest, ManifestError> {
    let parsed = parse_manifest(manifest_bytes)?;

    if let Some(index_id) = parsed.index_only() {
        return Ok(render_index_only(fetcher, &parsed, index_id, blobs, options).await);
    }

    let plan = plan_manifest(&parsed.manifest);
    let mut results: HashMap<TxId, LeafResult> = parsed
        .manifest
        .unique_leaves()
        .into_iter()
        .map(|id| (id, LeafResult::NotAttempted))
        .collect();

    let mut skipped_rest = false;
    match plan.strategy {
        LoadingStrategy::FullPrefetch => {
            let all: Vec<String> = plan
                .critical
                .iter()
                .chain(plan.rest.iter())
                .cloned()
                .collect();
            fetch_paths(fetcher, &parsed, &all, &mut results, blobs, options).await;
        }
        LoadingStrategy::CriticalFirst => {
            fetch_paths(fetcher, &parsed, &plan.critical, &mut results, blobs, options).await;
            fetch_paths_batched(fetcher, &parsed, &plan.rest, &mut results, blobs, options).await;
        }
        LoadingStrategy::Progressive => {
            fetch_paths(fetcher, &parsed, &plan.critical, &mut results, blobs, options).await;
            let continue_rest = match &options.continuation {
                Some(prompt) => prompt.continue_after_critical(plan.rest.len()).await,
                None => true,
            };
            if continue_rest {
                fetch_paths_batched(fetcher, &parsed, &plan.rest, &mut results, blobs, options)
                    .await;
            } else {
                skipped_rest = true;
            }
        }
    }

    let mut report = TrustReport::default();
    if !parsed.recovered.is_empty() {
        report.notes.push(format!(
            "recovered partial manifest; dropped entries: {}",
            parsed.recovered.join(", ")
        ));
    }
    for (path, entry) in &parsed.manifest.paths {
        let (status, reason) = match results.get(&entry.id) {
            Some(LeafResult::Fetched { outcome, .. }) => (status_for(outcome), outcome.reason()),
            Some(LeafResult::NotAttempted) | None => {
                let reason = if skipped_rest {
                    "deferred by progressive loading"
                } else {
                    "not attempted"
                };
                (ResourceStatus::Skipped, Some(reason.to_string()))
            }
        };
        report.push(ResourceReport {
            reference: path.clone(),
            status,
            reason,
        });
    }

    // Completion set = everything the strategy committed to load.
    let verified = report.failed == 0
        && parsed
            .manifest
            .paths
            .iter()
            .filter(|(path, _)| !skipped_rest || plan.critical.contains(*path))
            .all(|(_, entry)| {
                matches!(
                    results.get(&entry.id),
                    Some(LeafResult::Fetched {
                        outcome: VerificationOutcome::Verified,
                        ..
                    })
                )
            });

    let html = rewritten_index(&parsed, &results, blobs);
    let index_handle = parsed.manifest.index_leaf().and_then(|id| {
        matches!(
            results.get(&id),
            Some(LeafResult::Fetched {
                outcome: VerificationOutcome::Verified,
                ..
            })
        )
        .then(|| BlobHandle::for_leaf(id))
    });

    Ok(RenderedManifest {
        report,
        html,
        index_handle,
        verified,
    })
}

async fn render_index_only(
    fetcher: &dyn LeafFetcher,
    parsed: &ParsedManifest,
    index_id: TxId,
    blobs: &BlobStore,
    options: &RenderOptions,
) -> RenderedManifest {
    let leaf = fetcher.fetch_leaf(index_id).await;
    emit_progress(options, &index_id.to_base64url(), &leaf.outcome);

    let verified = leaf.outcome.is_verified();
    let index_handle = verified.then(|| blobs.insert(index_id, leaf.bytes.clone()));

    let mut report = TrustReport::default();
    report
        .notes
        .push("manifest reduced to its index entry".to_string());
    if !parsed.recovered.is_empty() {
        report.notes.push(format!(
            "recovered partial manifest; dropped entries: {}",
            parsed.recovered.join(", ")
        ));
    }
    report.push(ResourceReport {
        reference: index_id.to_base64url(),
        status: status_for(&leaf.outcome),
        reason: leaf.outcome.reason(),
    });

    let html = (verified && looks_like_html(leaf.content_type.as_deref(), &leaf.bytes))
        .then(|| String::from_utf8_lossy(&leaf.bytes).into_owned());

    RenderedManifest {
        report,
        html,
        index_handle,
        verified,
    }
}

/// Fetches the unique leaves behind `paths` concurrently.
async fn fetch_paths(
    fetcher: &dyn LeafFetcher,
    parsed: &ParsedManifest,
    paths: &[String],
    results: &mut HashMap<TxId, LeafResult>,
    blobs: &BlobStore,
    options: &RenderOptions,
) {
    if options.cancel.is_cancelled() {
        return;
    }
    let mut pending: Vec<TxId> = Vec::new();
    for path in paths {
        let Some(entry) = parsed.manifest.paths.get(path) else {
            continue;
        };
        if matches!(results.get(&entry.id), Some(LeafResult::NotAttempted))
            && !pending.contains(&entry.id)
        {
            pending.push(entry.id);
        }
    }

    let fetched = join_all(pending.iter().map(|id| fetcher.fetch_leaf(*id))).await;
    for (id, leaf) in pending.into_iter().zip(fetched) {
        if leaf.outcome.is_verified() {
            blobs.insert(id, leaf.bytes.clone());
        }
        for (path, entry) in &parsed.manifest.paths {
            if entry.id == id {
                emit_progress(options, path, &leaf.outcome);
            }
        }
        results.insert(
            id,
            LeafResult::Fetched {
                outcome: leaf.outcome,
                content_type: leaf.content_type,
            },
        );
    }
}

/// Fetches `paths` in small batches with an inter-batch delay.
async fn fetch_paths_batched(
    fetcher: &dyn LeafFetcher,
    parsed: &ParsedManifest,
    paths: &[String],
    results: &mut HashMap<TxId, LeafResult>,
    blobs: &BlobStore,
    options: &RenderOptions,
) {
    let mut first = true;
    for batch in paths.chunks(LEAF_BATCH_SIZE) {
        if options.cancel.is_cancelled() {
            return;
        }
        if !first {
            tokio::time::sleep(Duration::from_millis(LEAF_BATCH_DELAY_MS)).await;
        }
        first = false;
        fetch_paths(fetcher, parsed, batch, results, blobs, options).await;
    }
}

fn emit_progress(options: &RenderOptions, reference: &str, outcome: &VerificationOutcome) {
    if let Some(sink) = &options.on_progress {
        sink(LeafProgress {
            reference: reference.to_string(),
            status: status_for(outcome),
            reason: outcome.reason(),
        });
    }
}

fn looks_like_html(content_type: Option<&str>, bytes: &[u8]) -> bool {
    if content_type.is_some_and(|value| value.to_ascii_lowercase().contains("text/html")) {
        return true;
    }
    let head: String = String::from_utf8_lossy(&bytes[..bytes.len().min(256)])
        .trim_start()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

fn rewritten_index(
    parsed: &ParsedManifest,
    results: &HashMap<TxId, LeafResult>,
    blobs: &BlobStore,
) -> Option<String> {
    let index_id = parsed.manifest.index_leaf()?;
    let Some(LeafResult::Fetched {
        outcome: VerificationOutcome::Verified,
        content_type,
    }) = results.get(&index_id)
    else {
        return None;
    };
    let bytes = blobs.get(&BlobHandle::for_leaf(index_id))?;
    if !looks_like_html(content_type.as_deref(), &bytes) {
        return None;
    }
    let source = String::from_utf8_lossy(&bytes).into_owned();

    let resolve = |key: &str| -> Option<BlobHandle> {
        let entry = parsed.manifest.paths.get(key)?;
        matches!(
            results.get(&entry.id),
            Some(LeafResult::Fetched {
                outcome: VerificationOutcome::Verified,
                ..
            })
        )
        .then(|| BlobHandle::for_leaf(entry.id))
    };
    let outcome = rewrite_html(&source, &resolve);
    Some(outcome.html)
}
