//! Loading strategy selection for manifest fan-out.

use crate::schema::Manifest;

/// At or below this many unique leaves, everything is prefetched at once.
pub const FULL_PREFETCH_MAX: usize = 20;

/// Above `FULL_PREFETCH_MAX` and up to here, the critical set loads first
/// and the rest trickles in batches.
pub const CRITICAL_FIRST_MAX: usize = 100;

/// How many leading paths join the index in the critical set.
pub const CRITICAL_PATH_COUNT: usize = 3;

/// Non-critical leaves load this many at a time.
pub const LEAF_BATCH_SIZE: usize = 3;

/// Pause between non-critical batches.
pub const LEAF_BATCH_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `LoadingStrategy` values.
pub enum LoadingStrategy {
    FullPrefetch,
    CriticalFirst,
    Progressive,
}

/// Strategy by unique-leaf count.
pub fn choose_strategy(unique_leaves: usize) -> LoadingStrategy {
    if unique_leaves <= FULL_PREFETCH_MAX {
        LoadingStrategy::FullPrefetch
    } else if unique_leaves <= CRITICAL_FIRST_MAX {
        LoadingStrategy::CriticalFirst
    } else {
        LoadingStrategy::Progressive
    }
}

/// The paths to load, ordered into a critical set and the remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `RenderPlan` used across Waygate components.
pub struct RenderPlan {
    pub strategy: LoadingStrategy,
    pub critical: Vec<String>,
    pub rest: Vec<String>,
}

/// Splits the manifest's paths into critical-first order. The critical set
/// is the index path plus the first `CRITICAL_PATH_COUNT` paths.
pub fn plan_manifest(manifest: &Manifest) -> RenderPlan {
    let strategy = choose_strategy(manifest.unique_leaves().len());

    let mut critical: Vec<String> = Vec::new();
    if let Some(index) = &manifest.index {
        if let Some(path) = &index.path {
            critical.push(path.clone());
        }
    }
    for path in manifest.paths.keys().take(CRITICAL_PATH_COUNT) {
        if !critical.contains(path) {
            critical.push(path.clone());
        }
    }
    let rest: Vec<String> = manifest
        .paths
        .keys()
        .filter(|path| !critical.contains(path))
        .cloned()
        .collect();

    RenderPlan {
        strategy,
        critical,
        rest,
    }
}
