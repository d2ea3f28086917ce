use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

/// Failures from the document-store collaborator. The store never retries;
/// retry policy belongs to whoever drives the request.
#[derive(Debug)]
pub enum StoreError {
    Backend(String),
    NotFound { collection: String, id: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(msg) => write!(f, "store backend failure: {}", msg),
            StoreError::NotFound { collection, id } => {
                write!(f, "no document {}/{}", collection, id)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub fields: Value,
}

/// Filter primitives: equality and inclusive range bounds, AND-combined by
/// passing several in one call. No OR, no joins; cross-collection joins are
/// done by the caller in memory.
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(&'static str, Value),
    Gte(&'static str, Value),
    Lte(&'static str, Value),
}

pub trait DocumentStore {
    fn list(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&str>,
    ) -> Result<Vec<Document>, StoreError>;

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Creates a document. When `id` is None the store assigns a UUID.
    fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: &Value,
    ) -> Result<Document, StoreError>;

    /// Merges `patch` over the existing fields (top-level keys only).
    fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<Document, StoreError>;

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn matches(fields: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| match f {
        Filter::Eq(key, v) => fields.get(*key).map_or(false, |x| x == v),
        Filter::Gte(key, v) => fields
            .get(*key)
            .and_then(|x| compare_values(x, v))
            .map_or(false, |o| o != Ordering::Less),
        Filter::Lte(key, v) => fields
            .get(*key)
            .and_then(|x| compare_values(x, v))
            .map_or(false, |o| o != Ordering::Greater),
    })
}

fn sort_documents(docs: &mut [Document], order_by: Option<&str>) {
    if let Some(key) = order_by {
        docs.sort_by(|a, b| {
            let av = a.fields.get(key).unwrap_or(&Value::Null);
            let bv = b.fields.get(key).unwrap_or(&Value::Null);
            compare_values(av, bv).unwrap_or(Ordering::Equal)
        });
    }
}

fn merge_fields(existing: &Value, patch: &Value) -> Value {
    let mut base = match existing {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let Value::Object(p) = patch {
        for (k, v) in p {
            base.insert(k.clone(), v.clone());
        }
    }
    Value::Object(base)
}

/// Document store over a single SQLite table. Each row is one JSON blob of
/// fields keyed by (collection, id); filtering and ordering happen in memory
/// after a per-collection scan, which matches the contract's correctness
/// baseline.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        SqliteStore { conn }
    }
}

fn backend_err(e: impl fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl DocumentStore for SqliteStore {
    fn list(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&str>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, fields FROM documents WHERE collection = ? ORDER BY id")
            .map_err(backend_err)?;
        let rows = stmt
            .query_map([collection], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(backend_err)?;

        let mut docs = Vec::new();
        for (id, raw) in rows {
            let fields: Value = serde_json::from_str(&raw).map_err(backend_err)?;
            if matches(&fields, filters) {
                docs.push(Document { id, fields });
            }
        }
        sort_documents(&mut docs, order_by);
        Ok(docs)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT fields FROM documents WHERE collection = ? AND id = ?",
                (collection, id),
                |r| r.get(0),
            )
            .optional()
            .map_err(backend_err)?;
        match raw {
            Some(raw) => {
                let fields: Value = serde_json::from_str(&raw).map_err(backend_err)?;
                Ok(Some(Document {
                    id: id.to_string(),
                    fields,
                }))
            }
            None => Ok(None),
        }
    }

    fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: &Value,
    ) -> Result<Document, StoreError> {
        let id = id
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let raw = serde_json::to_string(fields).map_err(backend_err)?;
        self.conn
            .execute(
                "INSERT INTO documents(collection, id, fields) VALUES(?, ?, ?)",
                (collection, &id, &raw),
            )
            .map_err(backend_err)?;
        Ok(Document {
            id,
            fields: fields.clone(),
        })
    }

    fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<Document, StoreError> {
        let existing = self
            .get(collection, id)?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let merged = merge_fields(&existing.fields, patch);
        let raw = serde_json::to_string(&merged).map_err(backend_err)?;
        self.conn
            .execute(
                "UPDATE documents SET fields = ? WHERE collection = ? AND id = ?",
                (&raw, collection, id),
            )
            .map_err(backend_err)?;
        Ok(Document {
            id: id.to_string(),
            fields: merged,
        })
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let n = self
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ? AND id = ?",
                (collection, id),
            )
            .map_err(backend_err)?;
        if n == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory test double with the same observable behavior as `SqliteStore`.
pub struct MemoryStore {
    docs: Mutex<BTreeMap<(String, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            docs: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl MemoryStore {
    fn with_docs<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<(String, String), Value>) -> T,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .docs
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

impl DocumentStore for MemoryStore {
    fn list(
        &self,
        collection: &str,
        filters: &[Filter],
        order_by: Option<&str>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut docs = self.with_docs(|map| {
            map.iter()
                .filter(|(key, fields)| key.0 == collection && matches(fields, filters))
                .map(|(key, fields)| Document {
                    id: key.1.clone(),
                    fields: fields.clone(),
                })
                .collect::<Vec<_>>()
        })?;
        sort_documents(&mut docs, order_by);
        Ok(docs)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.with_docs(|map| {
            map.get(&(collection.to_string(), id.to_string()))
                .map(|fields| Document {
                    id: id.to_string(),
                    fields: fields.clone(),
                })
        })
    }

    fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: &Value,
    ) -> Result<Document, StoreError> {
        let id = id
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let key = (collection.to_string(), id.clone());
        let inserted = self.with_docs(|map| {
            if map.contains_key(&key) {
                false
            } else {
                map.insert(key.clone(), fields.clone());
                true
            }
        })?;
        if !inserted {
            return Err(StoreError::Backend(format!(
                "duplicate document {}/{}",
                collection, id
            )));
        }
        Ok(Document {
            id,
            fields: fields.clone(),
        })
    }

    fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<Document, StoreError> {
        let key = (collection.to_string(), id.to_string());
        let merged = self.with_docs(|map| {
            let existing = map.get(&key).cloned();
            existing.map(|existing| {
                let merged = merge_fields(&existing, patch);
                map.insert(key.clone(), merged.clone());
                merged
            })
        })?;
        match merged {
            Some(fields) => Ok(Document {
                id: id.to_string(),
                fields,
            }),
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let removed = self.with_docs(|map| {
            map.remove(&(collection.to_string(), id.to_string())).is_some()
        })?;
        if !removed {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_filters_and_orders() {
        let store = MemoryStore::new();
        store
            .create("things", Some("b"), &json!({ "day": "mon", "start": "10:00" }))
            .expect("create b");
        store
            .create("things", Some("a"), &json!({ "day": "mon", "start": "09:00" }))
            .expect("create a");
        store
            .create("things", Some("c"), &json!({ "day": "tue", "start": "08:00" }))
            .expect("create c");

        let monday = store
            .list(
                "things",
                &[Filter::Eq("day", json!("mon"))],
                Some("start"),
            )
            .expect("list");
        let ids: Vec<&str> = monday.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn range_filters_are_inclusive() {
        let store = MemoryStore::new();
        for (id, date) in [("a", "2025-09-01"), ("b", "2025-09-08"), ("c", "2025-09-15")] {
            store
                .create("rows", Some(id), &json!({ "date": date }))
                .expect("create");
        }
        let mid = store
            .list(
                "rows",
                &[
                    Filter::Gte("date", json!("2025-09-01")),
                    Filter::Lte("date", json!("2025-09-08")),
                ],
                Some("date"),
            )
            .expect("list");
        assert_eq!(mid.len(), 2);
    }

    #[test]
    fn update_merges_top_level_and_missing_is_not_found() {
        let store = MemoryStore::new();
        store
            .create("rows", Some("x"), &json!({ "a": 1, "b": 2 }))
            .expect("create");
        let doc = store
            .update("rows", "x", &json!({ "b": 3, "c": 4 }))
            .expect("update");
        assert_eq!(doc.fields, json!({ "a": 1, "b": 3, "c": 4 }));

        let missing = store.update("rows", "nope", &json!({ "a": 1 }));
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }
}
