//! Persisted shapes and the canonical snapshot format.
//!
//! ## Key-value layout
//!
//! | key                     | value                               |
//! |-------------------------|-------------------------------------|
//! | `slime_state_v4`        | JSON [`ProgressionState`]           |
//! | `slime_chat_history_v4` | JSON array of [`Message`]           |
//!
//! ## Canonical export
//!
//! ```text
//! +------+---------+---------------------------+
//! | SLIM | version | postcard(CanonicalSnapshot) |
//! +------+---------+---------------------------+
//!   4 B     1 B
//! ```

use crate::conversation::{ConversationLog, Message};
use crate::progression::{HistorySet, ProgressionState, TraitSet};
use crate::{CoreError, Result, TRAIT_COUNT};
use serde::{Deserialize, Serialize};

/// Key holding the progression state.
pub const STATE_KEY: &str = "slime_state_v4";

/// Key holding the message log.
pub const MESSAGES_KEY: &str = "slime_chat_history_v4";

/// Magic bytes opening a canonical export.
pub const CANONICAL_MAGIC: &[u8; 4] = b"SLIM";

/// Current canonical format version.
pub const CANONICAL_VERSION: u8 = 1;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Everything that makes up one slime: its state and its conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: ProgressionState,
    pub messages: ConversationLog,
}

impl Snapshot {
    #[must_use]
    pub fn new(state: ProgressionState, messages: ConversationLog) -> Self {
        Self { state, messages }
    }
}

// =============================================================================
// JSON (per key)
// =============================================================================

pub fn encode_state(state: &ProgressionState) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(state)?)
}

pub fn decode_state(bytes: &[u8]) -> Result<ProgressionState> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_messages(log: &ConversationLog) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(log)?)
}

pub fn decode_messages(bytes: &[u8]) -> Result<ConversationLog> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Pretty JSON of a whole snapshot, for human-readable export.
pub fn snapshot_to_json(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn snapshot_from_json(text: &str) -> Result<Snapshot> {
    Ok(serde_json::from_str(text)?)
}

// =============================================================================
// CANONICAL BINARY
// =============================================================================

/// Positional wire form. Postcard is not self-describing, so nothing here may
/// skip fields.
#[derive(Serialize, Deserialize)]
struct CanonicalSnapshot {
    stats: [u32; TRAIT_COUNT],
    history: [u32; TRAIT_COUNT],
    user_name: Option<String>,
    messages: Vec<Message>,
}

/// Encode a snapshot as header + postcard payload.
///
/// Identical snapshots always produce identical bytes.
pub fn encode_canonical(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let wire = CanonicalSnapshot {
        stats: snapshot.state.stats().values(),
        history: snapshot.state.history().counts(),
        user_name: snapshot.state.user_name().map(str::to_owned),
        messages: snapshot.messages.messages().to_vec(),
    };
    let payload = postcard::to_stdvec(&wire)?;

    let mut out = Vec::with_capacity(CANONICAL_MAGIC.len() + 1 + payload.len());
    out.extend_from_slice(CANONICAL_MAGIC);
    out.push(CANONICAL_VERSION);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a canonical export, validating header and trait ranges.
pub fn decode_canonical(bytes: &[u8]) -> Result<Snapshot> {
    let header_len = CANONICAL_MAGIC.len() + 1;
    if bytes.len() < header_len {
        return Err(CoreError::InvalidHeader(format!(
            "need at least {header_len} bytes, got {}",
            bytes.len()
        )));
    }
    if &bytes[..CANONICAL_MAGIC.len()] != CANONICAL_MAGIC {
        return Err(CoreError::InvalidHeader("bad magic".to_string()));
    }
    let version = bytes[CANONICAL_MAGIC.len()];
    if version != CANONICAL_VERSION {
        return Err(CoreError::InvalidHeader(format!(
            "unsupported version {version}"
        )));
    }

    let wire: CanonicalSnapshot = postcard::from_bytes(&bytes[header_len..])?;
    let state = ProgressionState::from_parts(
        TraitSet::from_values(wire.stats)?,
        HistorySet::from_counts(wire.history),
        wire.user_name,
    );
    Ok(Snapshot::new(state, ConversationLog::from_messages(wire.messages)))
}

/// Decode either format, picking canonical when the magic is present.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot> {
    if bytes.starts_with(CANONICAL_MAGIC) {
        decode_canonical(bytes)
    } else {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CoreError::InvalidHeader(format!("not canonical and not UTF-8: {e}")))?;
        snapshot_from_json(text)
    }
}

// =============================================================================
// TESTS
// =============================================================================
