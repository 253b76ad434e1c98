//! Foundational low-level utilities shared across Waygate crates.
//!
//! Provides the content-id codec, request reference parsing, atomic
//! file-write helpers and time utilities used by registry persistence,
//! performance stamps and expiry calculations.

pub mod atomic_io;
pub mod hash43;
pub mod reference;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use hash43::{looks_like_tx_id_segment, Hash43ParseError, TxId};
pub use reference::{is_valid_dns_label, ContentReference, ReferenceParseError};
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, is_expired_unix_ms};
