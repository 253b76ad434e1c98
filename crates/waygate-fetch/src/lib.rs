//! Retrieval engine: fetch bytes for a content reference through a chosen
//! gateway, as a streamed response.
//!
//! Two strategies: a contiguous single GET, and a chunked walk over the
//! gateway's per-chunk API for bundled items. Chunk bytes only surface
//! after their Merkle proof validates.

mod chunked;
mod classifier;
mod contiguous;
mod error;
mod headers;

pub use chunked::{fetch_chunked, ChunkedItem, CHUNK_FETCH_TIMEOUT_MS};
pub use classifier::{Classifier, ItemKind};
pub use contiguous::{fetch_contiguous, ContiguousResponse, DEFAULT_FETCH_TIMEOUT_MS};
pub use error::FetchError;
pub use headers::{
    HEADER_CHUNK_DATA_PATH, HEADER_CHUNK_READ_OFFSET, HEADER_CHUNK_START_OFFSET,
    HEADER_CHUNK_TX_ID, HEADER_FETCH_STRATEGY, HEADER_RESOLVED_ID, HEADER_ROOT_DATA_OFFSET,
    HEADER_ROOT_TX_ID,
};
