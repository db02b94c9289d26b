use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::attempt::{Attempt, AttemptId};

/// Key holding the serialized list of every attempt
pub const HISTORY_KEY: &str = "exam_attempts";
/// Key holding the serialized most recent attempt
pub const LAST_ATTEMPT_KEY: &str = "last_attempt";
/// History that was not a JSON list, set aside before a fresh list is started
pub const UNREADABLE_HISTORY_KEY: &str = "exam_attempts_unreadable";

/// Errors surfaced by storage gateways.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String key-value storage the attempt store persists through.
pub trait StorageGateway {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Writes every entry before returning. Gateways that can should make this atomic.
    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }
}

impl StorageGateway for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageGateway for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

/// Key-value table in a SQLite database
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

const UPSERT_SQL: &str = r#"
    INSERT INTO kv_store (key, value) VALUES (?1, ?2)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
"#;

impl StorageGateway for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(UPSERT_SQL, params![key, value])?;
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;

        for (key, value) in entries {
            tx.execute(UPSERT_SQL, params![key, value])?;
        }

        tx.commit()?;
        Ok(())
    }
}

/// Append-only attempt history plus a last-attempt pointer.
///
/// Reads are tolerant: missing or unparseable data reads as empty.
pub struct AttemptStore {
    gateway: Box<dyn StorageGateway>,
}

impl AttemptStore {
    pub fn new(gateway: Box<dyn StorageGateway>) -> Self {
        Self { gateway }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.gateway.get(key) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("could not read `{key}`: {e}");
                None
            }
        }
    }

    fn read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                log::debug!("ignoring malformed `{key}`: {e}");
                None
            }
        }
    }

    /// Stored history entries as raw JSON, unreadable ones included.
    ///
    /// `Err` carries the stored text when it is not a JSON list at all.
    fn raw_history(&self) -> Result<Vec<Value>, String> {
        match self.read_raw(HISTORY_KEY) {
            None => Ok(Vec::new()),
            Some(raw) => match serde_json::from_str::<Vec<Value>>(&raw) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    log::debug!("ignoring malformed `{HISTORY_KEY}`: {e}");
                    Err(raw)
                }
            },
        }
    }

    /// Adds `attempt` to the history and points the last-attempt slot at it.
    ///
    /// Entries that no longer parse are written back untouched. A history that
    /// is not a list is moved to `UNREADABLE_HISTORY_KEY` first.
    pub fn append(&mut self, attempt: &Attempt) -> Result<(), StorageError> {
        let (mut entries, unreadable) = match self.raw_history() {
            Ok(entries) => (entries, None),
            Err(raw) => (Vec::new(), Some(raw)),
        };
        entries.push(serde_json::to_value(attempt)?);

        let history_json = serde_json::to_string(&entries)?;
        let last_json = serde_json::to_string(attempt)?;
        let mut writes = vec![
            (HISTORY_KEY, history_json.as_str()),
            (LAST_ATTEMPT_KEY, last_json.as_str()),
        ];
        if let Some(raw) = unreadable.as_deref() {
            log::warn!("moving unreadable history to `{UNREADABLE_HISTORY_KEY}`");
            writes.insert(0, (UNREADABLE_HISTORY_KEY, raw));
        }
        self.gateway.set_many(&writes)?;

        log::info!(
            "recorded attempt {} for test {} ({}%)",
            attempt.id,
            attempt.test_id,
            attempt.score_percent
        );
        Ok(())
    }

    /// Every readable attempt in insertion order; unreadable entries are skipped
    pub fn load_history(&self) -> Vec<Attempt> {
        self.raw_history()
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| match serde_json::from_value(entry) {
                Ok(attempt) => Some(attempt),
                Err(e) => {
                    log::debug!("skipping unreadable attempt #{i}: {e}");
                    None
                }
            })
            .collect()
    }

    pub fn last_attempt(&self) -> Option<Attempt> {
        self.read(LAST_ATTEMPT_KEY)
    }

    /// Exact match in the history, otherwise the last attempt.
    pub fn load_by_id(&self, id: AttemptId) -> Option<Attempt> {
        self.load_history()
            .into_iter()
            .find(|a| a.id == id)
            .or_else(|| self.last_attempt())
    }

    /// `load_by_id` for `Some`, the last attempt for `None`
    pub fn resolve(&self, id: Option<AttemptId>) -> Option<Attempt> {
        match id {
            Some(id) => self.load_by_id(id),
            None => self.last_attempt(),
        }
    }

    pub fn latest_id(&self) -> Option<AttemptId> {
        self.load_history()
            .iter()
            .map(|a| a.id)
            .chain(self.last_attempt().map(|a| a.id))
            .max()
    }

    pub fn latest_for_test(&self, test_id: u32) -> Option<Attempt> {
        self.load_history()
            .into_iter()
            .filter(|a| a.test_id == test_id)
            .max_by_key(|a| a.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::{Breakdown, TopicTally};
    use tempfile::tempdir;

    fn attempt(id: i64, test_id: u32, score: u8) -> Attempt {
        let mut breakdown = Breakdown::new();
        breakdown.insert("Other".into(), TopicTally { total: 1, wrong: 0 });
        Attempt {
            id: AttemptId(id),
            test_id,
            correct_count: 1,
            total_count: 1,
            score_percent: score,
            timestamp_iso: "2026-10-19T08:00:00.000Z".into(),
            breakdown,
        }
    }

    fn exercise_gateway(store: &mut AttemptStore) {
        assert!(store.load_history().is_empty());
        assert!(store.last_attempt().is_none());

        store.append(&attempt(1, 1, 50)).unwrap();
        store.append(&attempt(2, 2, 80)).unwrap();

        let history = store.load_history();
        assert_eq!(
            history.iter().map(|a| a.id.0).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(store.last_attempt().unwrap().id, AttemptId(2));
    }

    #[test]
    fn memory_gateway_append_and_load() {
        exercise_gateway(&mut AttemptStore::in_memory());
    }

    #[test]
    fn json_file_gateway_append_and_load() {
        let dir = tempdir().unwrap();
        let mut store = AttemptStore::new(Box::new(JsonFileStorage::new(dir.path().join("state"))));
        exercise_gateway(&mut store);

        assert!(dir.path().join("state").join("exam_attempts.json").exists());
        assert!(dir.path().join("state").join("last_attempt.json").exists());
    }

    #[test]
    fn sqlite_gateway_append_and_load() {
        let mut store = AttemptStore::new(Box::new(SqliteStorage::open_in_memory().unwrap()));
        exercise_gateway(&mut store);
    }

    #[test]
    fn sqlite_gateway_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("attempts.db");
        {
            let mut store = AttemptStore::new(Box::new(SqliteStorage::open(&path).unwrap()));
            store.append(&attempt(10, 1, 90)).unwrap();
        }
        let store = AttemptStore::new(Box::new(SqliteStorage::open(&path).unwrap()));
        assert_eq!(store.load_history().len(), 1);
        assert_eq!(store.last_attempt().unwrap().score_percent, 90);
    }

    #[test]
    fn corrupt_history_reads_as_empty() {
        let gateway = MemoryStorage::new()
            .with_entry(HISTORY_KEY, "[{ this is not json")
            .with_entry(LAST_ATTEMPT_KEY, "null");
        let store = AttemptStore::new(Box::new(gateway));
        assert!(store.load_history().is_empty());
        assert!(store.last_attempt().is_none());
    }

    #[test]
    fn append_over_corrupt_history_starts_fresh() {
        let gateway = MemoryStorage::new().with_entry(HISTORY_KEY, "garbage");
        let mut store = AttemptStore::new(Box::new(gateway));
        store.append(&attempt(3, 1, 10)).unwrap();
        assert_eq!(store.load_history().len(), 1);
        assert_eq!(
            store.gateway.get(UNREADABLE_HISTORY_KEY).unwrap().as_deref(),
            Some("garbage")
        );
    }

    #[test]
    fn unreadable_entries_are_skipped_and_kept() {
        let mut bad = serde_json::to_value(attempt(3, 1, 30)).unwrap();
        bad["score"] = Value::Null;
        let mut too_big = serde_json::to_value(attempt(4, 1, 40)).unwrap();
        too_big["score"] = Value::from(300);
        let raw = Value::Array(vec![
            serde_json::to_value(attempt(1, 1, 10)).unwrap(),
            serde_json::to_value(attempt(2, 2, 20)).unwrap(),
            bad,
            too_big,
        ])
        .to_string();
        let gateway = MemoryStorage::new().with_entry(HISTORY_KEY, &raw);
        let mut store = AttemptStore::new(Box::new(gateway));

        let ids = |store: &AttemptStore| {
            store
                .load_history()
                .iter()
                .map(|a| a.id.0)
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&store), vec![1, 2]);

        store.append(&attempt(10, 1, 90)).unwrap();
        assert_eq!(ids(&store), vec![1, 2, 10]);

        let stored: Vec<Value> =
            serde_json::from_str(&store.gateway.get(HISTORY_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored.len(), 5);
        assert_eq!(stored[2]["score"], Value::Null);
        assert_eq!(stored[3]["score"], 300);
    }

    #[test]
    fn reads_history_with_short_field_names() {
        let raw = r#"[{"id":1700000000000,"testId":1,"correct":2,"total":3,"score":67,
            "date":"2023-11-14T22:13:20.000Z","breakdown":{"Genetics":{"total":3,"wrong":1}}}]"#;
        let store = AttemptStore::new(Box::new(MemoryStorage::new().with_entry(HISTORY_KEY, raw)));
        let history = store.load_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].score_percent, 67);
        assert_eq!(history[0].breakdown["Genetics"].wrong, 1);
    }

    #[test]
    fn load_by_id_missing_without_last_is_none() {
        let history = serde_json::to_string(&vec![
            attempt(1, 1, 10),
            attempt(2, 1, 20),
            attempt(3, 1, 30),
        ])
        .unwrap();
        let gateway = MemoryStorage::new().with_entry(HISTORY_KEY, &history);
        let store = AttemptStore::new(Box::new(gateway));
        assert_eq!(store.load_by_id(AttemptId(2)).unwrap().score_percent, 20);
        assert!(store.load_by_id(AttemptId(999)).is_none());
        assert!(store.resolve(None).is_none());
    }

    #[test]
    fn load_by_id_falls_back_to_last_attempt() {
        let mut store = AttemptStore::in_memory();
        store.append(&attempt(1, 1, 10)).unwrap();
        store.append(&attempt(2, 1, 20)).unwrap();

        assert_eq!(store.load_by_id(AttemptId(999)).unwrap().id, AttemptId(2));
        assert_eq!(store.resolve(None).unwrap().id, AttemptId(2));
        assert_eq!(store.resolve(Some(AttemptId(1))).unwrap().id, AttemptId(1));
    }

    #[test]
    fn latest_lookups() {
        let mut store = AttemptStore::in_memory();
        assert_eq!(store.latest_id(), None);

        store.append(&attempt(5, 1, 40)).unwrap();
        store.append(&attempt(9, 2, 70)).unwrap();
        store.append(&attempt(7, 1, 60)).unwrap();

        assert_eq!(store.latest_id(), Some(AttemptId(9)));
        assert_eq!(store.latest_for_test(1).unwrap().id, AttemptId(7));
        assert_eq!(store.latest_for_test(2).unwrap().score_percent, 70);
        assert!(store.latest_for_test(3).is_none());
    }
}
