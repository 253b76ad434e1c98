//! Path-manifest resolution and verifying render.
//!
//! Parses the path-manifest format (with partial recovery), fans the leaf
//! set out through the retrieval/verification stack, collects a trust
//! report, and rewrites the index document so every manifest-referenced
//! path points at a verified local blob.

mod blob;
mod plan;
mod render;
mod rewrite;
mod schema;

pub use blob::{BlobHandle, BlobStore};
pub use plan::{
    choose_strategy, plan_manifest, LoadingStrategy, RenderPlan, CRITICAL_FIRST_MAX,
    CRITICAL_PATH_COUNT, FULL_PREFETCH_MAX, LEAF_BATCH_DELAY_MS, LEAF_BATCH_SIZE,
};
pub use render::{
    render_manifest, ContinuationPrompt, LeafFetcher, LeafProgress, LeafProgressSink,
    RenderOptions, RenderedManifest, ResourceReport, ResourceStatus, TrustReport, VerifiedLeaf,
};
pub use rewrite::{is_external_url, rewrite_html, rewrite_css_urls};
pub use schema::{
    is_manifest_payload, parse_manifest, Manifest, ManifestEntry, ManifestError, ManifestIndex,
    ParsedManifest, MANIFEST_SCHEMA, SUPPORTED_VERSIONS,
};
