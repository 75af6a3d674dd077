//! Directory-backed store: `<dir>/<key>.json`.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write leaves the previous value intact.

use crate::storage::KeyValueStore;
use crate::{CoreError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CoreError::Storage(format!("invalid key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(temp.path().join("data")).unwrap();
        assert_eq!(store.get("slime_state_v4").unwrap(), None);

        store.put("slime_state_v4", b"{}").unwrap();
        assert_eq!(store.get("slime_state_v4").unwrap(), Some(b"{}".to_vec()));
        assert!(temp.path().join("data/slime_state_v4.json").exists());
        assert!(!temp.path().join("data/.slime_state_v4.json.tmp").exists());
    }

    #[test]
    fn overwrite_replaces_value() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        store.put("k", b"one").unwrap();
        store.put("k", b"two").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn rejects_path_like_keys() {
        let temp = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        assert!(store.put("../escape", b"x").is_err());
        assert!(store.get("a/b").is_err());
        assert!(store.get("").is_err());
    }
}
