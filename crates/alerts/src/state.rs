//! Persisted alert state.
//!
//! The state file is a flat JSON object mapping `SYMBOL|level` to the
//! RFC 3339 timestamp of the last successful send:
//!
//! ```json
//! {
//!   "BTCUSDC|500%+": "2026-10-17T09:00:00Z"
//! }
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use volume_core::{AlertKey, AlertRecord};

#[derive(Error, Debug)]
pub enum StateError {
    #[error("State file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt state in {origin}: {reason}")]
    Corrupt { origin: String, reason: String },
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StateError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StateError::Corrupt { .. })
    }
}

/// In-memory view of every cooldown slot. At most one record per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertStateStore {
    records: HashMap<AlertKey, AlertRecord>,
}

impl AlertStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &AlertKey) -> Option<&AlertRecord> {
        self.records.get(key)
    }

    /// Insert or overwrite the record for `key`.
    pub fn upsert(&mut self, key: AlertKey, last_sent_at: DateTime<Utc>) {
        self.records
            .insert(key.clone(), AlertRecord::new(key, last_sent_at));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertRecord> {
        self.records.values()
    }

    /// Drop records last sent more than `retention` before `now`.
    /// Returns the number of records removed.
    pub fn prune(&mut self, now: DateTime<Utc>, retention: TimeDelta) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| now - record.last_sent_at <= retention);
        before - self.records.len()
    }

    /// Encode to the on-disk JSON form. Keys are sorted so the file diffs
    /// cleanly between writes.
    pub fn to_json(&self) -> Result<String, StateError> {
        let map: BTreeMap<String, DateTime<Utc>> = self
            .records
            .values()
            .map(|record| (record.key.encode(), record.last_sent_at))
            .collect();
        Ok(serde_json::to_string_pretty(&map)?)
    }

    /// Decode the on-disk JSON form. `origin` names the source in errors.
    pub fn from_json(raw: &str, origin: &str) -> Result<Self, StateError> {
        let corrupt = |reason: String| StateError::Corrupt {
            origin: origin.to_string(),
            reason,
        };

        let map: BTreeMap<String, DateTime<Utc>> =
            serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;

        let mut store = Self::new();
        for (raw_key, last_sent_at) in map {
            let key = AlertKey::parse(&raw_key).map_err(|e| corrupt(e.to_string()))?;
            store.upsert(key, last_sent_at);
        }
        Ok(store)
    }
}

/// Durable storage for [`AlertStateStore`].
pub trait StateBackend: Send + Sync {
    /// Read the persisted state. Absent storage yields an empty store;
    /// unparseable storage yields [`StateError::Corrupt`].
    fn load(&self) -> Result<AlertStateStore, StateError>;

    /// Replace the persisted state with `store`. A concurrent reader never
    /// observes a partial write.
    fn save(&self, store: &AlertStateStore) -> Result<(), StateError>;
}

/// JSON file backend.
#[derive(Debug, Clone)]
pub struct JsonFileState {
    path: PathBuf,
}

impl JsonFileState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_err(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateBackend for JsonFileState {
    fn load(&self) -> Result<AlertStateStore, StateError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => AlertStateStore::from_json(&raw, &self.path.display().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AlertStateStore::new()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn save(&self, store: &AlertStateStore) -> Result<(), StateError> {
        let json = store.to_json()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }

        // Write to a sibling temp file, then rename over the target
        let temp_path = self.temp_path();
        let cleanup_and_err = |e: std::io::Error| {
            let _ = fs::remove_file(&temp_path);
            self.io_err(e)
        };

        let mut file = fs::File::create(&temp_path).map_err(|e| self.io_err(e))?;
        file.write_all(json.as_bytes()).map_err(cleanup_and_err)?;
        file.sync_all().map_err(cleanup_and_err)?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(cleanup_and_err)?;
        Ok(())
    }
}

/// In-memory backend holding the serialized form, for tests and dry runs.
///
/// Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    contents: Arc<Mutex<Option<String>>>,
    fail_saves: Arc<Mutex<bool>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that starts with `raw` as its persisted form.
    pub fn with_contents(raw: impl Into<String>) -> Self {
        let state = Self::new();
        *state.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw.into());
        state
    }

    /// Current persisted form, if anything was saved.
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Make subsequent saves fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }
}

impl StateBackend for MemoryState {
    fn load(&self) -> Result<AlertStateStore, StateError> {
        match self.contents() {
            Some(raw) => AlertStateStore::from_json(&raw, "memory"),
            None => Ok(AlertStateStore::new()),
        }
    }

    fn save(&self, store: &AlertStateStore) -> Result<(), StateError> {
        if *self.fail_saves.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(StateError::Io {
                path: PathBuf::from("memory"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "save disabled"),
            });
        }
        let json = store.to_json()?;
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_upsert_keeps_one_record_per_key() {
        let mut store = AlertStateStore::new();
        let key = AlertKey::new("BTCUSDC", "L1");
        store.upsert(key.clone(), t0());
        store.upsert(key.clone(), t0() + TimeDelta::hours(5));

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&key).unwrap().last_sent_at,
            t0() + TimeDelta::hours(5)
        );
    }

    #[test]
    fn test_json_format_is_flat_and_readable() {
        let mut store = AlertStateStore::new();
        store.upsert(AlertKey::new("BTCUSDC", "L1"), t0());

        let json = store.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["BTCUSDC|L1"], "2026-10-17T09:00:00Z");
    }

    #[test]
    fn test_json_restores_records() {
        let raw = r#"{
            "BTCUSDC|L1": "2026-10-17T09:00:00Z",
            "ETHBTC|L2": "2026-10-17T10:30:00+00:00"
        }"#;
        let store = AlertStateStore::from_json(raw, "test").unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get(&AlertKey::new("ETHBTC", "L2")).unwrap().last_sent_at,
            t0() + TimeDelta::minutes(90)
        );
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let cases = [
            "",
            "not json",
            "[1,2]",
            r#"{"NOSEPARATOR": "2026-10-17T09:00:00Z"}"#,
            r#"{"A|L1": "yesterday"}"#,
        ];
        for raw in cases {
            let err = AlertStateStore::from_json(raw, "test").unwrap_err();
            assert!(err.is_corrupt(), "expected corrupt for {:?}", raw);
        }
    }

    #[test]
    fn test_prune_drops_only_old_records() {
        let mut store = AlertStateStore::new();
        store.upsert(AlertKey::new("OLD", "L1"), t0() - TimeDelta::days(10));
        store.upsert(AlertKey::new("NEW", "L1"), t0() - TimeDelta::hours(1));

        let removed = store.prune(t0(), TimeDelta::days(7));

        assert_eq!(removed, 1);
        assert!(store.get(&AlertKey::new("NEW", "L1")).is_some());
        assert!(store.get(&AlertKey::new("OLD", "L1")).is_none());
    }

    #[test]
    fn test_file_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileState::new(dir.path().join("alert_state.json"));
        let store = backend.load().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_load_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        fs::write(&path, "{ truncated").unwrap();

        let err = JsonFileState::new(&path).load().unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_file_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("alert_state.json");
        let backend = JsonFileState::new(&path);

        let mut store = AlertStateStore::new();
        store.upsert(AlertKey::new("BTCUSDC", "500%+"), t0());
        backend.save(&store).unwrap();

        assert_eq!(backend.load().unwrap(), store);
        assert!(!backend.temp_path().exists());
    }

    #[test]
    fn test_file_save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileState::new(dir.path().join("alert_state.json"));

        let mut store = AlertStateStore::new();
        store.upsert(AlertKey::new("A", "L1"), t0());
        backend.save(&store).unwrap();
        store.upsert(AlertKey::new("B", "L1"), t0());
        backend.save(&store).unwrap();

        assert_eq!(backend.load().unwrap().len(), 2);
    }

    #[test]
    fn test_file_save_failure_cleans_up_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        // a non-empty directory at the target makes the rename fail
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "untouched").unwrap();
        let backend = JsonFileState::new(&path);

        let mut store = AlertStateStore::new();
        store.upsert(AlertKey::new("BTCUSDC", "L1"), t0());
        let err = backend.save(&store).unwrap_err();

        assert!(matches!(err, StateError::Io { .. }));
        assert!(!backend.temp_path().exists());
        assert!(path.is_dir());
        assert_eq!(fs::read_to_string(path.join("keep")).unwrap(), "untouched");
    }

    #[test]
    fn test_memory_state_shares_contents() {
        let backend = MemoryState::new();
        let view = backend.clone();

        let mut store = AlertStateStore::new();
        store.upsert(AlertKey::new("A", "L1"), t0());
        backend.save(&store).unwrap();

        assert!(view.contents().unwrap().contains("A|L1"));
        assert_eq!(view.load().unwrap(), store);
    }

    #[test]
    fn test_memory_state_failing_saves() {
        let backend = MemoryState::new();
        backend.set_fail_saves(true);
        let err = backend.save(&AlertStateStore::new()).unwrap_err();
        assert!(matches!(err, StateError::Io { .. }));
        assert_eq!(backend.contents(), None);
    }
}
