//! # Storage Module
//!
//! The persistence collaborator: a tiny key-value store holding exactly two
//! keys (state and message log), plus the load-with-fallback policy on top.
//!
//! Backends:
//! - [`MemoryStore`]: BTreeMap, for tests and throwaway sessions
//! - [`FileStore`]: one JSON file per key in a directory
//! - [`RedbStore`]: a single redb table (ACID, crash safe)
//!
//! Reads never fail from the caller's point of view: missing or corrupt data
//! yields the documented defaults, and the [`Loaded`] wrapper says why so the
//! app layer can log it.

mod file_store;
mod memory;
mod redb_store;

pub use file_store::FileStore;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::conversation::ConversationLog;
use crate::formats::{
    MESSAGES_KEY, STATE_KEY, Snapshot, decode_messages, decode_state, encode_messages,
    encode_state,
};
use crate::progression::ProgressionState;
use crate::Result;

// =============================================================================
// KEY-VALUE TRAIT
// =============================================================================

/// Minimal byte-oriented key-value store.
pub trait KeyValueStore {
    /// Read a value. `Ok(None)` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }
}

// =============================================================================
// LOAD RESULT
// =============================================================================

/// Where a loaded value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// Decoded from the store.
    Stored,
    /// Key absent; defaults used.
    Missing,
    /// Read or decode failed; defaults used. Carries the reason.
    Corrupt(String),
}

/// A value plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    pub value: T,
    pub source: LoadSource,
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Load/save policy for the two persisted keys.
#[derive(Debug)]
pub struct Persistence<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Restore the progression state, or the fresh default.
    pub fn load_state(&self) -> Loaded<ProgressionState> {
        load_with(&self.store, STATE_KEY, decode_state, ProgressionState::default)
    }

    /// Restore the message log, or a log holding only the greeting stamped
    /// with `now_ms`.
    pub fn load_messages(&self, now_ms: i64) -> Loaded<ConversationLog> {
        load_with(&self.store, MESSAGES_KEY, decode_messages, || {
            ConversationLog::with_greeting(now_ms)
        })
    }

    pub fn save_state(&mut self, state: &ProgressionState) -> Result<()> {
        let bytes = encode_state(state)?;
        self.store.put(STATE_KEY, &bytes)
    }

    pub fn save_messages(&mut self, log: &ConversationLog) -> Result<()> {
        let bytes = encode_messages(log)?;
        self.store.put(MESSAGES_KEY, &bytes)
    }

    /// Write both keys. Stops at the first failure.
    pub fn save_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.save_state(&snapshot.state)?;
        self.save_messages(&snapshot.messages)
    }
}

fn load_with<S, T>(
    store: &S,
    key: &str,
    decode: impl Fn(&[u8]) -> Result<T>,
    fallback: impl FnOnce() -> T,
) -> Loaded<T>
where
    S: KeyValueStore + ?Sized,
{
    let (value, source) = match store.get(key) {
        Ok(Some(bytes)) => match decode(&bytes) {
            Ok(value) => (value, LoadSource::Stored),
            Err(e) => (fallback(), LoadSource::Corrupt(e.to_string())),
        },
        Ok(None) => (fallback(), LoadSource::Missing),
        Err(e) => (fallback(), LoadSource::Corrupt(e.to_string())),
    };
    Loaded { value, source }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::TraitId;
    use crate::conversation::{Message, Role};

    #[test]
    fn missing_keys_restore_defaults() {
        let persistence = Persistence::new(MemoryStore::new());
        let state = persistence.load_state();
        let log = persistence.load_messages(42);

        assert_eq!(state.source, LoadSource::Missing);
        assert_eq!(state.value, ProgressionState::default());
        assert_eq!(log.source, LoadSource::Missing);
        assert_eq!(log.value, ConversationLog::with_greeting(42));
    }

    #[test]
    fn corrupt_values_restore_defaults() {
        let mut store = MemoryStore::new();
        store.put(STATE_KEY, b"{\"stats\": 3").unwrap();
        store.put(MESSAGES_KEY, b"not even json").unwrap();
        let persistence = Persistence::new(store);

        let state = persistence.load_state();
        assert!(matches!(state.source, LoadSource::Corrupt(_)));
        assert_eq!(state.value.level(), 10);

        let log = persistence.load_messages(1);
        assert!(matches!(log.source, LoadSource::Corrupt(_)));
        assert_eq!(log.value.len(), 1);
    }

    #[test]
    fn saved_snapshot_restores_identically() {
        let mut persistence = Persistence::new(MemoryStore::new());
        let mut state = ProgressionState::default();
        state.apply_increment(TraitId::Passion, Some("Sora"));
        let mut log = ConversationLog::with_greeting(1);
        log.push(Message::new(Role::User, "hello", 2));

        persistence
            .save_snapshot(&Snapshot::new(state.clone(), log.clone()))
            .unwrap();

        let loaded_state = persistence.load_state();
        let loaded_log = persistence.load_messages(99);
        assert_eq!(loaded_state.source, LoadSource::Stored);
        assert_eq!(loaded_state.value, state);
        assert_eq!(loaded_log.value, log);
    }
}
