//! The application context and the request pipeline.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use waygate_core::{ContentReference, TxId};
use waygate_fetch::{
    fetch_chunked, fetch_contiguous, Classifier, FetchError, ItemKind,
};
use waygate_manifest::{
    is_manifest_payload, render_manifest, BlobHandle, BlobStore, ContinuationPrompt, LeafFetcher,
    LeafProgressSink, RenderOptions, TrustReport, VerifiedLeaf,
};
use waygate_registry::{
    benchmark_gateways, BenchmarkGate, Gateway, GatewayRegistry, PerformanceCache,
    PerformanceRecord, ProbeOutcome, RegistrySnapshot, RegistrySource, StateStore,
};
use waygate_routing::{
    rank_by_composite, RouteTarget, Router, RoutingError, RoutingStrategy, ROUTING_RETRY_LIMIT,
};
use waygate_verify::{
    verify_stream, DigestVerifier, ProgressHandler, VerificationOutcome, VerifyFailure,
};

use crate::config::WaygateConfig;
use crate::error::WaygateError;

/// Pool size fed into benchmark rounds.
const BENCHMARK_TOP_K: usize = 25;

/// The caller-facing result of one retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `VerifiedArtifact` used across Waygate components.
pub struct VerifiedArtifact {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub verified: bool,
    pub failure_reason: Option<String>,
}

/// An artifact plus the per-resource trust report behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub artifact: VerifiedArtifact,
    pub report: TrustReport,
}

/// Per-request knobs and event sinks.
#[derive(Default)]
pub struct FetchOptions {
    /// Byte-level progress of the main content (one event per MiB).
    pub on_progress: Option<ProgressHandler>,
    /// Per-leaf verification updates during manifest rendering.
    pub on_resource_progress: Option<LeafProgressSink>,
    /// Progressive-strategy choice point.
    pub continuation: Option<Arc<dyn ContinuationPrompt>>,
    pub cancel: CancellationToken,
}

struct RawArtifact {
    bytes: Bytes,
    content_type: Option<String>,
    status: u16,
    outcome: VerificationOutcome,
}

/// Public struct `WaygateClient` used across Waygate components.
pub struct WaygateClient {
    config: WaygateConfig,
    http: reqwest::Client,
    registry: Arc<GatewayRegistry>,
    perf: Arc<PerformanceCache>,
    router: Router,
    classifier: Classifier,
    blobs: BlobStore,
    store: Option<StateStore>,
    benchmark_gate: Arc<BenchmarkGate>,
    strategy: Mutex<RoutingStrategy>,
    static_gateway: Mutex<Option<String>>,
}

impl WaygateClient {
    /// Builds the context and restores persisted state when a state
    /// directory is configured.
    pub fn new(config: WaygateConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("waygate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let registry = Arc::new(GatewayRegistry::new());
        let perf = Arc::new(PerformanceCache::new());
        let benchmark_gate = Arc::new(BenchmarkGate::new(config.benchmark_interval_ms));
        let store = config.state_dir.as_ref().map(StateStore::new);

        let mut strategy = config.routing_strategy;
        let mut static_gateway = config.static_gateway.clone();
        if let Some(store) = &store {
            if let Some(gateways) = store.load_registry() {
                if let Err(error) = registry.refresh(gateways) {
                    tracing::warn!(%error, "persisted registry snapshot rejected");
                }
            }
            if let Some(records) = store.load_performance() {
                perf.restore(records);
            }
            if let Some(blacklist) = store.load_blacklist() {
                registry.set_blacklist(blacklist);
            }
            if let Some(tag) = store.load_strategy() {
                match tag.parse() {
                    Ok(parsed) => strategy = parsed,
                    Err(error) => tracing::warn!(%error, "persisted strategy tag ignored"),
                }
            }
            if let Some(url) = store.load_static_gateway() {
                static_gateway = Some(url);
            }
        }

        let router = Router::new(
            Arc::clone(&registry),
            Arc::clone(&perf),
            http.clone(),
            Arc::clone(&benchmark_gate),
        )
        .with_bootstrap(config.bootstrap_gateway.trim_end_matches('/'));

        Ok(Self {
            config,
            http,
            registry,
            perf,
            router,
            classifier: Classifier::new(),
            blobs: BlobStore::new(),
            store,
            benchmark_gate,
            strategy: Mutex::new(strategy),
            static_gateway: Mutex::new(static_gateway),
        })
    }

    /// Fetches and verifies one reference, rendering it as a composite
    /// artifact when the payload is a path manifest.
    pub async fn fetch(
        &self,
        reference: &ContentReference,
        options: &FetchOptions,
    ) -> Result<FetchOutcome, WaygateError> {
        let raw = self.fetch_single(reference, options).await?;

        let render_as_manifest =
            !matches!(raw.outcome, VerificationOutcome::Failed(_)) && is_manifest_payload(&raw.bytes);
        if render_as_manifest {
            return self.render_manifest_artifact(reference, raw, options).await;
        }

        let verified = raw.outcome.is_verified();
        if !verified {
            self.warn_or_fail(reference, &raw.outcome)?;
        }
        let report = TrustReport::single(reference.to_string(), &raw.outcome);
        Ok(FetchOutcome {
            artifact: VerifiedArtifact {
                bytes: raw.bytes,
                content_type: raw.content_type,
                verified,
                failure_reason: raw.outcome.reason(),
            },
            report,
        })
    }

    async fn render_manifest_artifact(
        &self,
        reference: &ContentReference,
        raw: RawArtifact,
        options: &FetchOptions,
    ) -> Result<FetchOutcome, WaygateError> {
        let fetcher = LeafClient {
            client: self,
            cancel: options.cancel.clone(),
        };
        let render_options = RenderOptions {
            on_progress: options.on_resource_progress.clone(),
            continuation: options.continuation.clone(),
            cancel: options.cancel.clone(),
        };
        let rendered = render_manifest(&fetcher, &raw.bytes, &self.blobs, &render_options).await?;
        if options.cancel.is_cancelled() {
            return Err(WaygateError::Cancelled);
        }

        let verified = raw.outcome.is_verified() && rendered.verified;
        let failure_reason = if verified {
            None
        } else if let Some(reason) = raw.outcome.reason() {
            Some(reason)
        } else {
            Some(format!(
                "{} of {} resources failed verification",
                rendered.report.failed, rendered.report.total
            ))
        };

        if rendered.report.failed > 0 {
            if self.config.strict_mode {
                return Err(WaygateError::Verification(VerifyFailure::Transport(
                    failure_reason.unwrap_or_else(|| "resource verification failed".to_string()),
                )));
            }
            tracing::warn!(
                %reference,
                failed = rendered.report.failed,
                "delivering composite with unverified resources"
            );
        }

        let (bytes, content_type) = match rendered.html {
            Some(html) => (Bytes::from(html), Some("text/html".to_string())),
            None => (raw.bytes, raw.content_type),
        };
        Ok(FetchOutcome {
            artifact: VerifiedArtifact {
                bytes,
                content_type,
                verified,
                failure_reason,
            },
            report: rendered.report,
        })
    }

    /// Strict mode turns a failed verification into a request failure;
    /// lenient mode logs and delivers. Skipped verification never fails a
    /// request.
    fn warn_or_fail(
        &self,
        reference: &ContentReference,
        outcome: &VerificationOutcome,
    ) -> Result<(), WaygateError> {
        let VerificationOutcome::Failed(failure) = outcome else {
            return Ok(());
        };
        if self.config.strict_mode {
            return Err(WaygateError::Verification(failure.clone()));
        }
        tracing::warn!(%reference, %failure, "delivering unverified bytes");
        Ok(())
    }

    /// One reference through routing, retrieval and verification, with
    /// gateway re-selection on retryable failures.
    async fn fetch_single(
        &self,
        reference: &ContentReference,
        options: &FetchOptions,
    ) -> Result<RawArtifact, WaygateError> {
        let strategy = *self.strategy.lock().expect("strategy lock poisoned");
        let static_gateway = self
            .static_gateway
            .lock()
            .expect("static gateway lock poisoned")
            .clone();

        let mut exclude: BTreeSet<String> = BTreeSet::new();
        let mut unusable: Option<RawArtifact> = None;
        let mut last_error: Option<FetchError> = None;
        let mut timeout_retried = false;

        for _ in 0..ROUTING_RETRY_LIMIT {
            if options.cancel.is_cancelled() {
                return Err(WaygateError::Cancelled);
            }
            let target = match self
                .router
                .select(strategy, static_gateway.as_deref(), &exclude)
                .await
            {
                Ok(target) => target,
                // Routing ran out of candidates; surface what the attempts
                // actually saw.
                Err(error) => {
                    if let Some(raw) = unusable {
                        return Ok(raw);
                    }
                    return Err(match last_error {
                        Some(FetchError::Http(inner)) if inner.is_timeout() => {
                            WaygateError::Timeout(self.config.fetch_timeout_ms)
                        }
                        Some(fetch_error) => fetch_error.into(),
                        None => error.into(),
                    });
                }
            };

            match self.attempt(&target, reference, options).await {
                Ok(raw) => {
                    if let VerificationOutcome::Failed(VerifyFailure::UpstreamStatus(status)) =
                        &raw.outcome
                    {
                        tracing::debug!(
                            origin = %target.origin,
                            status,
                            "gateway answered without content, re-selecting"
                        );
                        self.perf.record_failure(&target.perf_key());
                        exclude.insert(target.exclusion_key());
                        unusable = Some(raw);
                        if static_gateway.is_some() {
                            break;
                        }
                        continue;
                    }
                    return Ok(raw);
                }
                Err(FetchError::Cancelled) => return Err(WaygateError::Cancelled),
                Err(error) => {
                    self.perf.record_failure(&target.perf_key());
                    if !error.is_retryable() {
                        return Err(error.into());
                    }
                    let timed_out =
                        matches!(&error, FetchError::Http(inner) if inner.is_timeout());
                    tracing::debug!(origin = %target.origin, %error, "attempt failed");
                    exclude.insert(target.exclusion_key());
                    last_error = Some(error);
                    if static_gateway.is_some() {
                        break;
                    }
                    if timed_out {
                        // A timeout earns exactly one re-selection.
                        if timeout_retried {
                            break;
                        }
                        timeout_retried = true;
                    }
                }
            }
        }

        if let Some(raw) = unusable {
            return Ok(raw);
        }
        Err(match last_error {
            Some(FetchError::Http(inner)) if inner.is_timeout() => {
                WaygateError::Timeout(self.config.fetch_timeout_ms)
            }
            Some(error) => error.into(),
            None => WaygateError::Routing(RoutingError::NoEligibleGateways),
        })
    }

    /// One attempt against one gateway.
    async fn attempt(
        &self,
        target: &RouteTarget,
        reference: &ContentReference,
        options: &FetchOptions,
    ) -> Result<RawArtifact, FetchError> {
        let verify = self.config.verification_enabled;
        let started = Instant::now();

        // Bare ids may live inside a bundle; those ride the chunk API so
        // every chunk is proof-checked instead of hashing a stream we
        // cannot bind.
        if let ContentReference::Id { tx_id, path: None } = reference {
            let kind = self
                .classifier
                .classify(&self.http, &target.origin, *tx_id, &options.cancel)
                .await?;
            if kind == ItemKind::BundledItem {
                match fetch_chunked(&self.http, &target.origin, *tx_id, verify, &options.cancel)
                    .await
                {
                    Ok(item) => {
                        let bytes = collect_stream(item.stream).await?;
                        self.record_success(target, started);
                        let outcome = if verify {
                            VerificationOutcome::Verified
                        } else {
                            VerificationOutcome::Skipped
                        };
                        return Ok(RawArtifact {
                            bytes,
                            content_type: None,
                            status: 200,
                            outcome,
                        });
                    }
                    Err(FetchError::ChunkApiUnavailable(reason)) => {
                        tracing::debug!(origin = %target.origin, %reason, "falling back to contiguous");
                    }
                    Err(error) => return Err(error),
                }
            }
        }

        let url = target.url_for(reference);
        let response =
            fetch_contiguous(&self.http, &url, self.config.fetch_timeout_ms, &options.cancel)
                .await?;

        if !(200..300).contains(&response.status) {
            return Ok(RawArtifact {
                bytes: Bytes::new(),
                content_type: response.content_type,
                status: response.status,
                outcome: VerificationOutcome::Failed(VerifyFailure::UpstreamStatus(
                    response.status,
                )),
            });
        }

        let status = response.status;
        let content_type = response.content_type.clone();

        if !verify {
            let bytes = collect_stream(response.stream).await?;
            self.record_success(target, started);
            return Ok(RawArtifact {
                bytes,
                content_type,
                status,
                outcome: VerificationOutcome::Skipped,
            });
        }

        let expected = reference.expected_id().or(response.resolved_id);
        let verifier = DigestVerifier::new(
            expected,
            response.content_length,
            options.on_progress.clone(),
        );
        let (stream, outcome_rx) = verify_stream(response.stream, verifier);
        let bytes = collect_stream(stream.boxed()).await?;
        let outcome = outcome_rx.await.unwrap_or(VerificationOutcome::Failed(
            VerifyFailure::Transport("verifier dropped before end of stream".to_string()),
        ));
        self.record_success(target, started);

        Ok(RawArtifact {
            bytes,
            content_type,
            status,
            outcome,
        })
    }

    fn record_success(&self, target: &RouteTarget, started: Instant) {
        let elapsed_ms = started.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        self.perf.record_success(&target.perf_key(), elapsed_ms);
    }

    /// Replaces the registry from a snapshot source and persists it.
    pub async fn refresh_registry(
        &self,
        source: &dyn RegistrySource,
    ) -> Result<usize, WaygateError> {
        let gateways = source.fetch_gateways().await.map_err(WaygateError::State)?;
        self.registry.refresh(gateways)?;
        let snapshot = self.registry.snapshot();
        if let Some(store) = &self.store {
            let gateways: Vec<Gateway> = snapshot.gateways().cloned().collect();
            if let Err(error) = store.save_registry(&gateways) {
                tracing::warn!(%error, "failed to persist registry snapshot");
            }
        }
        Ok(snapshot.len())
    }

    /// Probes the top composite-scored gateways (inside the benchmark
    /// window) and persists the refreshed performance records.
    pub async fn benchmark(&self) -> Vec<ProbeOutcome> {
        if !self.benchmark_gate.try_begin() {
            tracing::debug!("benchmark window still fresh, skipping");
            return Vec::new();
        }
        let eligible = self.registry.eligible();
        let targets: Vec<Gateway> = rank_by_composite(&eligible, BENCHMARK_TOP_K)
            .into_iter()
            .cloned()
            .collect();
        let outcomes = benchmark_gateways(&self.http, &targets, &self.perf).await;
        self.persist_performance();
        outcomes
    }

    pub fn registry_snapshot(&self) -> Arc<RegistrySnapshot> {
        self.registry.snapshot()
    }

    pub fn eligible_gateways(&self) -> Vec<Gateway> {
        self.registry.eligible()
    }

    pub fn performance(&self, fqdn: &str) -> Option<PerformanceRecord> {
        self.perf.get(fqdn)
    }

    pub fn strategy(&self) -> RoutingStrategy {
        *self.strategy.lock().expect("strategy lock poisoned")
    }

    pub fn set_strategy(&self, strategy: RoutingStrategy) {
        *self.strategy.lock().expect("strategy lock poisoned") = strategy;
        if let Some(store) = &self.store {
            if let Err(error) = store.save_strategy(strategy.as_str()) {
                tracing::warn!(%error, "failed to persist routing strategy");
            }
        }
    }

    pub fn static_gateway(&self) -> Option<String> {
        self.static_gateway
            .lock()
            .expect("static gateway lock poisoned")
            .clone()
    }

    pub fn set_static_gateway(&self, url: Option<String>) {
        *self
            .static_gateway
            .lock()
            .expect("static gateway lock poisoned") = url.clone();
        if let Some(store) = &self.store {
            if let Err(error) = store.save_static_gateway(url.as_deref()) {
                tracing::warn!(%error, "failed to persist static gateway");
            }
        }
    }

    pub fn blacklist(&self) -> BTreeSet<String> {
        BTreeSet::clone(&self.registry.blacklist())
    }

    /// Flips one address and persists the set; returns whether it is
    /// blacklisted afterwards.
    pub fn toggle_blacklist(&self, address: &str) -> bool {
        let now_blacklisted = self.registry.toggle_blacklist(address);
        self.persist_blacklist();
        now_blacklisted
    }

    pub fn set_blacklist(&self, addresses: BTreeSet<String>) {
        self.registry.set_blacklist(addresses);
        self.persist_blacklist();
    }

    pub fn blob(&self, handle: &BlobHandle) -> Option<Bytes> {
        self.blobs.get(handle)
    }

    /// Caller teardown: drop every blob handle produced by past renders.
    pub fn release_blobs(&self) {
        self.blobs.release_all();
    }

    /// Persists all mutable state. Call before dropping the context.
    pub fn shutdown(&self) {
        self.persist_performance();
        self.persist_blacklist();
        if let Some(store) = &self.store {
            let gateways: Vec<Gateway> = self.registry.snapshot().gateways().cloned().collect();
            if !gateways.is_empty() {
                if let Err(error) = store.save_registry(&gateways) {
                    tracing::warn!(%error, "failed to persist registry snapshot");
                }
            }
            if let Err(error) = store.save_strategy(self.strategy().as_str()) {
                tracing::warn!(%error, "failed to persist routing strategy");
            }
            if let Err(error) = store.save_static_gateway(self.static_gateway().as_deref()) {
                tracing::warn!(%error, "failed to persist static gateway");
            }
        }
        self.blobs.release_all();
    }

    fn persist_performance(&self) {
        if let Some(store) = &self.store {
            if let Err(error) = store.save_performance(&self.perf.snapshot()) {
                tracing::warn!(%error, "failed to persist performance records");
            }
        }
    }

    fn persist_blacklist(&self) {
        if let Some(store) = &self.store {
            if let Err(error) = store.save_blacklist(&self.registry.blacklist()) {
                tracing::warn!(%error, "failed to persist blacklist");
            }
        }
    }
}

/// Runs manifest leaves through the full stack; failures become failed
/// leaf outcomes instead of aborting siblings.
struct LeafClient<'a> {
    client: &'a WaygateClient,
    cancel: CancellationToken,
}

#[async_trait]
impl LeafFetcher for LeafClient<'_> {
    async fn fetch_leaf(&self, tx_id: TxId) -> VerifiedLeaf {
        let options = FetchOptions {
            cancel: self.cancel.clone(),
            ..Default::default()
        };
        match self
            .client
            .fetch_single(&ContentReference::id(tx_id), &options)
            .await
        {
            Ok(raw) => VerifiedLeaf {
                bytes: raw.bytes,
                content_type: raw.content_type,
                outcome: raw.outcome,
            },
            Err(error) => VerifiedLeaf {
                bytes: Bytes::new(),
                content_type: None,
                outcome: VerificationOutcome::Failed(VerifyFailure::Transport(error.to_string())),
            },
        }
    }
}

async fn collect_stream<S>(mut stream: S) -> Result<Bytes, FetchError>
where
    S: Stream<Item = Result<Bytes, FetchError>> + Unpin,
{
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}

#[cfg(test)]
mod tests {
    use httpmock::{Method, MockServer};
    use sha2::{Digest, Sha256};

    use waygate_core::{ContentReference, TxId};
    use waygate_registry::{Gateway, GatewayProtocol, GatewayStatus, StaticRegistrySource};
    use waygate_routing::RoutingStrategy;

    use super::{FetchOptions, WaygateClient};
    use crate::config::WaygateConfig;
    use crate::error::WaygateError;

    fn digest_of(payload: &[u8]) -> TxId {
        TxId::from_bytes(Sha256::digest(payload).into())
    }

    fn gateway_for(server: &MockServer) -> Gateway {
        Gateway {
            address: "test-gateway".to_string(),
            fqdn: server.host(),
            protocol: GatewayProtocol::Http,
            port: server.port(),
            status: GatewayStatus::Joined,
            operator_stake: 100,
            total_delegated_stake: 0,
            weights: Default::default(),
            stats: Default::default(),
        }
    }

    async fn client_for(server: &MockServer, config: WaygateConfig) -> WaygateClient {
        let client = WaygateClient::new(config).expect("client");
        client
            .refresh_registry(&StaticRegistrySource::new(vec![gateway_for(server)]))
            .await
            .expect("refresh");
        client
    }

    fn config() -> WaygateConfig {
        WaygateConfig {
            routing_strategy: RoutingStrategy::Random,
            ..Default::default()
        }
    }

    fn mock_content(server: &MockServer, payload: &'static [u8]) -> TxId {
        let id = digest_of(payload);
        server.mock(move |when, then| {
            when.method(Method::GET).path(format!("/{id}"));
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body(payload);
        });
        // The classifier HEADs the item first; no root header means
        // plain transaction.
        server.mock(move |when, then| {
            when.method(Method::HEAD).path(format!("/{id}"));
            then.status(200).header("content-length", payload.len().to_string());
        });
        id
    }

    #[tokio::test]
    async fn verified_contiguous_fetch_round_trips() {
        let server = MockServer::start();
        let id = mock_content(&server, b"small verified payload");
        let client = client_for(&server, config()).await;

        let outcome = client
            .fetch(&ContentReference::id(id), &FetchOptions::default())
            .await
            .expect("fetch");

        assert!(outcome.artifact.verified);
        assert_eq!(outcome.artifact.bytes.as_ref(), b"small verified payload");
        assert_eq!(outcome.report.total, 1);
        assert_eq!(outcome.report.verified, 1);
        assert_eq!(outcome.artifact.failure_reason, None);
    }

    #[tokio::test]
    async fn corrupted_payload_reports_hash_mismatch_leniently() {
        let server = MockServer::start();
        let id = digest_of(b"expected payload");
        server.mock(move |when, then| {
            when.method(Method::HEAD).path(format!("/{id}"));
            then.status(200);
        });
        server.mock(move |when, then| {
            when.method(Method::GET).path(format!("/{id}"));
            then.status(200).body(b"expectEd payload");
        });
        let client = client_for(&server, config()).await;

        let outcome = client
            .fetch(&ContentReference::id(id), &FetchOptions::default())
            .await
            .expect("lenient mode delivers");
        assert!(!outcome.artifact.verified);
        assert!(outcome
            .artifact
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("digest mismatch"));
        assert_eq!(outcome.report.failed, 1);
    }

    #[tokio::test]
    async fn strict_mode_fails_on_mismatch() {
        let server = MockServer::start();
        let id = digest_of(b"expected payload");
        server.mock(move |when, then| {
            when.method(Method::HEAD).path(format!("/{id}"));
            then.status(200);
        });
        server.mock(move |when, then| {
            when.method(Method::GET).path(format!("/{id}"));
            then.status(200).body(b"tampered payload!");
        });
        let mut strict = config();
        strict.strict_mode = true;
        let client = client_for(&server, strict).await;

        let error = client
            .fetch(&ContentReference::id(id), &FetchOptions::default())
            .await
            .expect_err("strict mode rejects");
        assert!(matches!(error, WaygateError::Verification(_)));
    }

    #[tokio::test]
    async fn disabled_verification_is_skipped_not_failed() {
        let server = MockServer::start();
        let id = digest_of(b"whatever");
        server.mock(move |when, then| {
            when.method(Method::GET).path(format!("/{id}"));
            then.status(200).body(b"entirely different bytes");
        });
        let mut relaxed = config();
        relaxed.verification_enabled = false;
        relaxed.strict_mode = true;
        let client = client_for(&server, relaxed).await;

        let outcome = client
            .fetch(&ContentReference::id(id), &FetchOptions::default())
            .await
            .expect("skip never fails, even strict");
        assert!(!outcome.artifact.verified);
        assert_eq!(
            outcome.artifact.failure_reason.as_deref(),
            Some("verification disabled")
        );
        assert_eq!(outcome.report.skipped, 1);
    }

    #[tokio::test]
    async fn name_without_binding_reports_no_binding() {
        let server = MockServer::start();
        // Underscore label forces the path form, which the mock can serve.
        server.mock(|when, then| {
            when.method(Method::GET).path("/my_site");
            then.status(200).body(b"unbound name content");
        });
        let client = client_for(&server, config()).await;

        let reference: ContentReference = "my_site".parse().unwrap();
        let outcome = client
            .fetch(&reference, &FetchOptions::default())
            .await
            .expect("lenient delivery");
        assert!(!outcome.artifact.verified);
        assert!(outcome
            .artifact
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("binding"));
    }

    #[tokio::test]
    async fn name_with_resolved_binding_verifies() {
        let server = MockServer::start();
        let payload = b"named content";
        let id = digest_of(payload);
        server.mock(move |when, then| {
            when.method(Method::GET).path("/my_site");
            then.status(200)
                .header("x-arns-resolved-id", id.to_base64url())
                .body(payload);
        });
        let client = client_for(&server, config()).await;

        let reference: ContentReference = "my_site".parse().unwrap();
        let outcome = client
            .fetch(&reference, &FetchOptions::default())
            .await
            .expect("fetch");
        assert!(outcome.artifact.verified);
    }

    #[tokio::test]
    async fn gateway_without_content_is_surfaced_unverified() {
        let server = MockServer::start();
        let id = digest_of(b"absent");
        server.mock(move |when, then| {
            when.method(Method::HEAD).path(format!("/{id}"));
            then.status(404);
        });
        server.mock(move |when, then| {
            when.method(Method::GET).path(format!("/{id}"));
            then.status(404);
        });
        // Keep the bootstrap fallback inside the mock too; the retry loop
        // walks to it after the registry gateway misses.
        let mut config = config();
        config.bootstrap_gateway = server.base_url();
        let client = client_for(&server, config).await;

        let outcome = client
            .fetch(&ContentReference::id(id), &FetchOptions::default())
            .await
            .expect("lenient delivery of the miss");
        assert!(!outcome.artifact.verified);
        assert!(outcome
            .artifact
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("404"));
    }

    #[tokio::test]
    async fn state_survives_a_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = MockServer::start();
        let mut persisted = config();
        persisted.state_dir = Some(dir.path().to_path_buf());

        {
            let client = client_for(&server, persisted.clone()).await;
            client.set_strategy(RoutingStrategy::HighestStake);
            client.set_static_gateway(Some("https://pinned.example".to_string()));
            assert!(client.toggle_blacklist("bad-gateway"));
            client.shutdown();
        }

        let revived = WaygateClient::new(persisted).expect("revive");
        assert_eq!(revived.strategy(), RoutingStrategy::HighestStake);
        assert_eq!(
            revived.static_gateway().as_deref(),
            Some("https://pinned.example")
        );
        assert!(revived.blacklist().contains("bad-gateway"));
        assert_eq!(revived.registry_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_produces_no_artifact() {
        let server = MockServer::start();
        let id = mock_content(&server, b"soon cancelled");
        let client = client_for(&server, config()).await;

        let options = FetchOptions::default();
        options.cancel.cancel();
        let error = client
            .fetch(&ContentReference::id(id), &options)
            .await
            .expect_err("cancelled");
        assert!(matches!(error, WaygateError::Cancelled));
    }
}
