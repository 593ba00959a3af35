//! Record store implementation.

use crate::{IndexError, IndexResult};
use docstore_uuid::StorageId;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The field the index treats as the primary key.
const ID_FIELD: &str = "id";

/// Equality constraints on top-level record fields.
///
/// An empty filter matches every record. Keys absent from the filter are not
/// constrained; a filtered key must be present on the record *and* equal to
/// the filter value.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    fields: BTreeMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality constraint on `field`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns true when every constrained field is present and equal.
    pub fn matches(&self, record: &Value) -> bool {
        let Some(object) = record.as_object() else {
            return false;
        };
        self.fields
            .iter()
            .all(|(field, expected)| object.get(field) == Some(expected))
    }
}

/// A partial update: whole-field replacement plus array append.
///
/// `set` fields overwrite (or create) the named top-level field. `push`
/// fields append the value to the named array, creating a one-element array
/// when the field is missing. Fields not named by the patch are untouched.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    set: BTreeMap<String, Value>,
    push: BTreeMap<String, Value>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the top-level `field` with `value`.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// Appends `value` to the array at `field`, creating the array if needed.
    pub fn push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.push.is_empty()
    }

    fn apply(&self, record: &mut Map<String, Value>) {
        for (field, value) in &self.set {
            record.insert(field.clone(), value.clone());
        }
        for (field, value) in &self.push {
            match record.get_mut(field) {
                Some(Value::Array(items)) => items.push(value.clone()),
                _ => {
                    record.insert(field.clone(), Value::Array(vec![value.clone()]));
                }
            }
        }
    }
}

/// The embedded metadata index.
///
/// Holds all records in memory and persists them as JSON-lines at the path
/// given to [`RecordStore::open`]. All operations are serialized through an
/// internal mutex; callers never coordinate access themselves.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    records: Mutex<Vec<Value>>,
}

impl RecordStore {
    /// Opens the store at `path`, loading any previously persisted records.
    ///
    /// A missing file is an empty store. A present-but-unreadable file or a
    /// corrupt record line is an error: silently dropping records would turn
    /// storage corruption into invisible data loss.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Open`] on I/O failure and [`IndexError::Corrupt`]
    /// when a persisted line does not parse as a JSON object.
    pub fn open(path: &Path) -> IndexResult<Self> {
        let mut records = Vec::new();

        match fs::File::open(path) {
            Ok(file) => {
                let reader = BufReader::new(file);
                for line in reader.lines() {
                    let line = line.map_err(IndexError::Open)?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record: Value =
                        serde_json::from_str(&line).map_err(IndexError::Corrupt)?;
                    if !record.is_object() {
                        return Err(IndexError::NotAnObject);
                    }
                    records.push(record);
                }
                tracing::debug!(
                    count = records.len(),
                    path = %path.display(),
                    "loaded metadata index"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "starting with empty metadata index");
            }
            Err(e) => return Err(IndexError::Open(e)),
        }

        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        })
    }

    /// Inserts a record, assigning a fresh canonical `id` when absent.
    ///
    /// Returns the record as stored, including its `id`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotAnObject`] when `record` is not a JSON object
    /// and [`IndexError::Persist`] when the store cannot be written.
    pub fn insert(&self, record: Value) -> IndexResult<Value> {
        let Value::Object(mut object) = record else {
            return Err(IndexError::NotAnObject);
        };

        if !object.contains_key(ID_FIELD) {
            object.insert(
                ID_FIELD.to_string(),
                Value::String(StorageId::new().to_string()),
            );
        }

        let record = Value::Object(object);
        let mut records = self.lock();
        records.push(record.clone());
        self.persist(&records)?;
        Ok(record)
    }

    /// Returns all records matching `filter`, in insertion order.
    pub fn find(&self, filter: &Filter) -> Vec<Value> {
        self.lock()
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }

    /// Patches the first record matching `filter`.
    ///
    /// Returns the post-update record, or `None` when nothing matched (in
    /// which case the store is untouched and nothing is persisted).
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Persist`] when the store cannot be written.
    pub fn update(&self, filter: &Filter, patch: &Patch) -> IndexResult<Option<Value>> {
        let mut records = self.lock();

        let Some(record) = records.iter_mut().find(|record| filter.matches(&**record)) else {
            return Ok(None);
        };

        // matches() only succeeds on objects, so this cannot fail
        let Value::Object(object) = record else {
            return Err(IndexError::NotAnObject);
        };
        patch.apply(object);
        let updated = record.clone();

        self.persist(&records)?;
        Ok(Some(updated))
    }

    /// Removes records matching `filter`, returning the number removed.
    ///
    /// With `multi` false, at most the first match is removed. Removing zero
    /// records is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Persist`] when the store cannot be written.
    pub fn remove(&self, filter: &Filter, multi: bool) -> IndexResult<usize> {
        let mut records = self.lock();

        let before = records.len();
        if multi {
            records.retain(|record| !filter.matches(record));
        } else if let Some(pos) = records.iter().position(|record| filter.matches(record)) {
            records.remove(pos);
        }
        let removed = before - records.len();

        if removed > 0 {
            self.persist(&records)?;
        }
        Ok(removed)
    }

    /// Total number of records currently in the store.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Value>> {
        // A poisoned lock only means another request panicked mid-operation;
        // the record vector itself is always left in a consistent state.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rewrites the full record set, then renames it into place.
    fn persist(&self, records: &[Value]) -> IndexResult<()> {
        let tmp_path = self.path.with_extension("db.tmp");

        let mut file = fs::File::create(&tmp_path).map_err(IndexError::Persist)?;
        for record in records {
            let line = serde_json::to_string(record).map_err(IndexError::Corrupt)?;
            file.write_all(line.as_bytes())
                .and_then(|()| file.write_all(b"\n"))
                .map_err(IndexError::Persist)?;
        }
        file.sync_all().map_err(IndexError::Persist)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(IndexError::Persist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> RecordStore {
        RecordStore::open(&temp.path().join("database.db")).unwrap()
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_assigns_id() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let record = store.insert(json!({"username": "user1"})).unwrap();
        let id = record["id"].as_str().unwrap();
        assert_eq!(id.len(), 32);
        assert_eq!(record["username"], "user1");
    }

    #[test]
    fn test_insert_keeps_existing_id() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let record = store
            .insert(json!({"id": "abc123", "username": "user1"}))
            .unwrap();
        assert_eq!(record["id"], "abc123");
    }

    #[test]
    fn test_insert_rejects_non_object() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let result = store.insert(json!([1, 2, 3]));
        assert!(matches!(result, Err(IndexError::NotAnObject)));
    }

    #[test]
    fn test_insert_assigns_distinct_ids() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let a = store.insert(json!({"n": 1})).unwrap();
        let b = store.insert(json!({"n": 2})).unwrap();
        assert_ne!(a["id"], b["id"]);
    }

    #[test]
    fn test_find_equality_and_insertion_order() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        store
            .insert(json!({"username": "user1", "type": "json", "n": 1}))
            .unwrap();
        store
            .insert(json!({"username": "user2", "type": "json", "n": 2}))
            .unwrap();
        store
            .insert(json!({"username": "user1", "type": "png", "n": 3}))
            .unwrap();

        let mine = store.find(&Filter::new().eq("username", "user1"));
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0]["n"], 1);
        assert_eq!(mine[1]["n"], 3);

        let json_docs = store.find(&Filter::new().eq("username", "user1").eq("type", "json"));
        assert_eq!(json_docs.len(), 1);
        assert_eq!(json_docs[0]["n"], 1);
    }

    #[test]
    fn test_find_empty_filter_returns_all() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        store.insert(json!({"n": 1})).unwrap();
        store.insert(json!({"n": 2})).unwrap();

        assert_eq!(store.find(&Filter::new()).len(), 2);
    }

    #[test]
    fn test_filter_requires_field_presence() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        store.insert(json!({"username": "user1"})).unwrap();

        let results = store.find(&Filter::new().eq("type", "json"));
        assert!(results.is_empty());
    }

    #[test]
    fn test_update_sets_fields_and_returns_updated() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let record = store
            .insert(json!({"username": "user1", "title": "old", "type": "json"}))
            .unwrap();
        let id = record["id"].as_str().unwrap().to_string();

        let updated = store
            .update(
                &Filter::new().eq("id", id.as_str()).eq("username", "user1"),
                &Patch::new().set("title", "new"),
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated["title"], "new");
        // untouched fields retain their values
        assert_eq!(updated["type"], "json");
    }

    #[test]
    fn test_update_no_match_returns_none() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        store.insert(json!({"username": "user1"})).unwrap();
        let result = store
            .update(
                &Filter::new().eq("username", "user2"),
                &Patch::new().set("title", "x"),
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_push_creates_and_appends_array() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let record = store.insert(json!({"username": "user1"})).unwrap();
        let id = record["id"].as_str().unwrap().to_string();
        let filter = Filter::new().eq("id", id.as_str());

        let first = store
            .update(&filter, &Patch::new().push("thumbnails", json!({"w": 1})))
            .unwrap()
            .unwrap();
        assert_eq!(first["thumbnails"].as_array().unwrap().len(), 1);

        let second = store
            .update(&filter, &Patch::new().push("thumbnails", json!({"w": 2})))
            .unwrap()
            .unwrap();
        let thumbs = second["thumbnails"].as_array().unwrap();
        assert_eq!(thumbs.len(), 2);
        assert_eq!(thumbs[0]["w"], 1);
        assert_eq!(thumbs[1]["w"], 2);
    }

    #[test]
    fn test_remove_multi_counts_matches() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        store.insert(json!({"username": "user1", "type": "json"})).unwrap();
        store.insert(json!({"username": "user1", "type": "png"})).unwrap();
        store.insert(json!({"username": "user2", "type": "json"})).unwrap();

        let removed = store
            .remove(&Filter::new().eq("username", "user1"), true)
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_single_removes_first_only() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        store.insert(json!({"username": "user1", "n": 1})).unwrap();
        store.insert(json!({"username": "user1", "n": 2})).unwrap();

        let removed = store
            .remove(&Filter::new().eq("username", "user1"), false)
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = store.find(&Filter::new());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["n"], 2);
    }

    #[test]
    fn test_remove_no_match_is_zero_not_error() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let removed = store
            .remove(&Filter::new().eq("username", "nobody"), true)
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("database.db");

        {
            let store = RecordStore::open(&path).unwrap();
            store
                .insert(json!({"username": "user1", "title": "kept"}))
                .unwrap();
        }

        let reopened = RecordStore::open(&path).unwrap();
        let records = reopened.find(&Filter::new().eq("username", "user1"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["title"], "kept");
    }

    #[test]
    fn test_corrupt_line_is_surfaced() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("database.db");
        std::fs::write(&path, "{\"ok\":true}\nnot json at all\n").unwrap();

        let result = RecordStore::open(&path);
        assert!(matches!(result, Err(IndexError::Corrupt(_))));
    }
}
