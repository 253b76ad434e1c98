//! Typed duplex channel between an embedding shell and the core.
//!
//! The shell sends commands; the core answers with updates. The core never
//! calls back into the shell: every interaction rides these two queues, so
//! a viewer surface can live in another task, process or message bus.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use waygate_core::ContentReference;
use waygate_manifest::{ResourceStatus, TrustReport};

use crate::client::{FetchOptions, WaygateClient};
use crate::error::WaygateError;

/// Commands a viewer shell can issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Enumerates supported `ViewerCommand` values.
pub enum ViewerCommand {
    FetchVerifiedContent { request_id: u64, reference: String },
    ReleaseBlobs { request_id: u64 },
}

/// Updates the core emits while serving commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// Enumerates supported `ViewerUpdate` values.
pub enum ViewerUpdate {
    /// Byte-level progress of the main content.
    Progress {
        request_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percentage: Option<f64>,
        processed_mb: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_mb: Option<f64>,
    },
    /// One manifest resource settled.
    ResourceVerification {
        request_id: u64,
        reference: String,
        status: ResourceStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Terminal verdict for the main content, with the full report.
    MainContentVerification {
        request_id: u64,
        verified: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        report: TrustReport,
    },
    /// The command could not be served at all.
    RequestFailed {
        request_id: u64,
        reason: String,
    },
}

/// Serves commands until the command sender closes or `shutdown` fires.
///
/// Each fetch runs as its own task so a slow artifact does not block the
/// queue; updates for concurrent requests interleave, keyed by
/// `request_id`.
pub async fn serve_channel(
    client: Arc<WaygateClient>,
    mut commands: mpsc::Receiver<ViewerCommand>,
    updates: mpsc::Sender<ViewerUpdate>,
    shutdown: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            _ = shutdown.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };
        match command {
            ViewerCommand::FetchVerifiedContent {
                request_id,
                reference,
            } => {
                let client = Arc::clone(&client);
                let updates = updates.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    serve_fetch(client, request_id, reference, updates, shutdown).await;
                });
            }
            ViewerCommand::ReleaseBlobs { .. } => client.release_blobs(),
        }
    }
}

async fn serve_fetch(
    client: Arc<WaygateClient>,
    request_id: u64,
    reference: String,
    updates: mpsc::Sender<ViewerUpdate>,
    shutdown: CancellationToken,
) {
    let reference: ContentReference = match reference.parse() {
        Ok(reference) => reference,
        Err(error) => {
            let _ = updates
                .send(ViewerUpdate::RequestFailed {
                    request_id,
                    reason: error.to_string(),
                })
                .await;
            return;
        }
    };

    let progress_updates = updates.clone();
    let resource_updates = updates.clone();
    let options = FetchOptions {
        on_progress: Some(Arc::new(move |progress| {
            let _ = progress_updates.try_send(ViewerUpdate::Progress {
                request_id,
                percentage: progress.percentage,
                processed_mb: progress.processed_mb,
                total_mb: progress.total_mb,
            });
        })),
        on_resource_progress: Some(Arc::new(move |leaf| {
            let _ = resource_updates.try_send(ViewerUpdate::ResourceVerification {
                request_id,
                reference: leaf.reference,
                status: leaf.status,
                reason: leaf.reason,
            });
        })),
        continuation: None,
        cancel: shutdown.child_token(),
    };

    let update = match client.fetch(&reference, &options).await {
        Ok(outcome) => ViewerUpdate::MainContentVerification {
            request_id,
            verified: outcome.artifact.verified,
            reason: outcome.artifact.failure_reason,
            report: outcome.report,
        },
        Err(WaygateError::Cancelled) => return,
        Err(error) => ViewerUpdate::RequestFailed {
            request_id,
            reason: error.to_string(),
        },
    };
    let _ = updates.send(update).await;
}
