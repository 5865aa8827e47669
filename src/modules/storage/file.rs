use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::KeyValueStore;
use crate::modules::utils::logging::log_data_operation;

/// Durable key-value store kept as one JSON object on disk.
///
/// Every read picks up what other processes wrote since, and every
/// mutation writes the whole file back. The file is created on the first
/// write; a missing or corrupt file loads as an empty store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading whatever is already there
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = load_entries(&path)?;
        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Re-read the file; on a read error the last known entries are kept
    fn refresh(&self) {
        match load_entries(&self.path) {
            Ok(entries) => *self.entries.borrow_mut() = entries,
            Err(e) => log_data_operation(
                "refresh_store",
                "system",
                &self.path.display().to_string(),
                false,
                Some(&e.to_string()),
            ),
        }
    }

    fn persist(&self) -> io::Result<()> {
        let data = serde_json::to_string_pretty(&*self.entries.borrow())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        File::create(&self.path)?.write_all(data.as_bytes())
    }
}

fn load_entries(path: &Path) -> io::Result<BTreeMap<String, String>> {
    let mut data = String::new();
    match File::open(path) {
        Ok(mut file) => {
            file.read_to_string(&mut data)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e),
    }

    if data.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    match serde_json::from_str(&data) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            log_data_operation(
                "load_store",
                "system",
                &path.display().to_string(),
                false,
                Some(&format!("Discarding unreadable store: {}", e)),
            );
            Ok(BTreeMap::new())
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.refresh();
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.refresh();
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.refresh();
        let removed = self.entries.borrow_mut().remove(key);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        self.entries.borrow_mut().clear();
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("isLoggedIn").is_none());
        // Nothing is written until the first mutation
        assert!(!path.exists());

        store.set("isLoggedIn", "true").unwrap();
        store.set("loginTime", "1700000000000").unwrap();
        assert!(path.exists());

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("isLoggedIn").as_deref(), Some("true"));
        assert_eq!(reopened.get("loginTime").as_deref(), Some("1700000000000"));

        reopened.remove("isLoggedIn").unwrap();
        let again = FileStore::open(&path).unwrap();
        assert!(again.get("isLoggedIn").is_none());
        assert!(again.get("loginTime").is_some());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "this is not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("anything").is_none());

        // The next write replaces the corrupt content
        store.set("currentToken", "IRSINH2026478192").unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("currentToken").as_deref(),
            Some("IRSINH2026478192")
        );
    }

    #[test]
    fn test_sees_writes_from_another_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let first = FileStore::open(&path).unwrap();
        let second = FileStore::open(&path).unwrap();

        first.set("currentToken", "IRSINH2026478192").unwrap();
        assert_eq!(
            second.get("currentToken").as_deref(),
            Some("IRSINH2026478192")
        );

        // A write from the second handle keeps the first handle's keys
        second.set("tokenUsedTime", "1700000000000").unwrap();
        assert!(first.get("currentToken").is_some());
        assert_eq!(first.get("tokenUsedTime").as_deref(), Some("1700000000000"));
    }

    #[test]
    fn test_clear_empties_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = FileStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.clear().unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.get("a").is_none());
    }
}
