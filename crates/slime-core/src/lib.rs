//! # Slime Core
//!
//! The deterministic progression engine behind the slime companion.
//!
//! A slime has seven trait counters. Every chat turn raises exactly one of
//! them; the level, the dominant trait and the evolution stage are pure
//! functions of those counters. Everything here is synchronous and free of
//! wall-clock reads, so the same inputs always produce the same state.
//!
//! ## Modules
//!
//! - [`catalog`]: the seven traits and their display metadata
//! - [`progression`]: trait sets, level, dominant trait, increments
//! - [`system`]: evolution stages, thresholds, narrative lines, display FSM
//! - [`conversation`]: the append-only message log
//! - [`transcript`]: plain-text export of the log
//! - [`formats`]: snapshot encodings (JSON and canonical binary)
//! - [`storage`]: the key-value persistence collaborator

pub mod catalog;
pub mod conversation;
pub mod formats;
pub mod progression;
pub mod storage;
pub mod system;
pub mod transcript;

pub use catalog::{
    BASE_LEVEL, FALLBACK_TRAIT, MAX_LEVEL, TRAIT_COUNT, TRAIT_DEFS, TRAIT_MAX_VALUE,
    TRAIT_START_VALUE, TraitDef, TraitId,
};
pub use conversation::{ConversationLog, Message, Role};
pub use formats::Snapshot;
pub use progression::{
    HistorySet, IncrementOutcome, ProgressionState, TraitSet, compute_level, dominant_trait,
    trait_ranking,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, Persistence, RedbStore};
pub use system::{DisplayController, DisplayPhase, EvolutionStage, Threshold, crossed_threshold};

use thiserror::Error;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors raised by the core.
///
/// The progression engine itself is total and never returns these; they come
/// from decoding snapshots and from the storage backends.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A trait value lies outside [`TRAIT_START_VALUE`, `TRAIT_MAX_VALUE`].
    #[error("trait {trait_id} value {value} out of range {min}..={max}")]
    TraitOutOfRange {
        trait_id: TraitId,
        value: u32,
        min: u32,
        max: u32,
    },

    /// A serialized trait table did not carry all seven traits.
    #[error("trait table has {found} entries, expected 7")]
    IncompleteTraitTable { found: usize },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding or decoding failed.
    #[error("binary codec error: {0}")]
    Codec(#[from] postcard::Error),

    /// Canonical snapshot header was wrong.
    #[error("invalid snapshot header: {0}")]
    InvalidHeader(String),

    /// Filesystem error from the file backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the redb backend.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<redb::Error> for CoreError {
    fn from(e: redb::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<redb::DatabaseError> for CoreError {
    fn from(e: redb::DatabaseError) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<redb::TransactionError> for CoreError {
    fn from(e: redb::TransactionError) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<redb::TableError> for CoreError {
    fn from(e: redb::TableError) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<redb::StorageError> for CoreError {
    fn from(e: redb::StorageError) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<redb::CommitError> for CoreError {
    fn from(e: redb::CommitError) -> Self {
        CoreError::Storage(e.to_string())
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
