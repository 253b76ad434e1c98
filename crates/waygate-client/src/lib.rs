//! The Waygate application context and request pipeline.
//!
//! `WaygateClient` owns every shared collaborator (HTTP client, registry,
//! performance cache, router, classifier, blob store, state store) and
//! drives one reference through routing, retrieval, verification and
//! manifest rendering. There is no process-global state; embedders pass
//! the context around explicitly.

mod client;
mod config;
mod error;
mod events;

pub use client::{FetchOptions, FetchOutcome, VerifiedArtifact, WaygateClient};
pub use config::WaygateConfig;
pub use error::WaygateError;
pub use events::{serve_channel, ViewerCommand, ViewerUpdate};
