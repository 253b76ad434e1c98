//! Gateway header names consumed and produced by the retrieval strategies.

/// Diagnostic request header identifying which strategy issued a request.
pub const HEADER_FETCH_STRATEGY: &str = "x-waygate-fetch-strategy";

/// Digest the gateway resolved a name (or in-content path) to.
pub const HEADER_RESOLVED_ID: &str = "x-arns-resolved-id";

/// Root transaction enclosing a bundled item.
pub const HEADER_ROOT_TX_ID: &str = "x-root-tx-id";

/// Offset of a bundled item relative to its root transaction's data.
pub const HEADER_ROOT_DATA_OFFSET: &str = "x-root-data-offset";

/// Absolute start offset of a returned chunk.
pub const HEADER_CHUNK_START_OFFSET: &str = "x-chunk-start-offset";

/// Offset within a returned chunk at which the requested bytes begin.
pub const HEADER_CHUNK_READ_OFFSET: &str = "x-chunk-read-offset";

/// Transaction the returned chunk belongs to.
pub const HEADER_CHUNK_TX_ID: &str = "x-chunk-tx-id";

/// Base64url Merkle path proving a chunk against the root transaction.
pub const HEADER_CHUNK_DATA_PATH: &str = "x-chunk-data-path";
