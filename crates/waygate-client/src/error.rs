use thiserror::Error;

use waygate_fetch::FetchError;
use waygate_manifest::ManifestError;
use waygate_registry::RegistryError;
use waygate_routing::RoutingError;
use waygate_verify::VerifyFailure;

#[derive(Debug, Error)]
/// Enumerates supported `WaygateError` values.
pub enum WaygateError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("verification failed: {0}")]
    Verification(VerifyFailure),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("request cancelled")]
    Cancelled,
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error(transparent)]
    State(#[from] anyhow::Error),
}
