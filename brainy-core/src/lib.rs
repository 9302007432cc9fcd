//! Brainy Core
//!
//! Shared domain types and the unified error enum used across the Brainy
//! workspace: nouns, verbs, metadata, statistics, change-log entries, and
//! the error kinds of the storage, vector, and pipeline layers.

pub mod error;
pub mod types;

pub use error::{BrainyError, Result};
pub use types::*;

/// Version of the Brainy on-disk/wire formats (noun, verb, statistics,
/// change-log blobs — see the persisted formats).
pub const BRAINY_PROTOCOL_VERSION: &str = "1.0.0";
