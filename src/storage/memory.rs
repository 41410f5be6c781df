//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`.
//! It keeps every table in a HashMap protected by a RwLock.
//!
//! ## Limitations
//!
//! - **No rollback**: writes are applied immediately. `stop_change()` only
//!   closes the batch; a failed multi-step mutation is NOT undone.
//! - **No indexes**: `select_where()` scans the whole table.
//! - **Batches are bookkeeping**: `query_begin()`/`query_commit()` are
//!   counted but change nothing about how writes are applied.
//!
//! It does enforce the schema (table, column, type, nullability), rejects
//! writes outside a change, and rejects references to rows that do not exist
//! unless a removal cascade is in progress.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::{BackendStats, ColumnDef, OwnerType, RowId, StorageBackend};
use crate::model::Value;
use crate::{Error, Result};

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory row storage. Clones share the same tables.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: RwLock<HashMap<String, Table>>,
    next_id: AtomicU64,
    batch: Mutex<BatchState>,
    stats: Mutex<BackendStats>,
}

/// Open counts. Clones of one backend, each under its own graph, may
/// overlap their changes and batches.
#[derive(Debug, Default)]
struct BatchState {
    changes: usize,
    removals: usize,
    queries: usize,
}

struct Table {
    owner: OwnerType,
    columns: Vec<ColumnDef>,
    /// row id → rows in insertion order
    rows: HashMap<RowId, Vec<Vec<Value>>>,
}

impl Table {
    fn column(&self, table: &str, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::StorageError(format!("unknown column '{name}' in table '{table}'")))
    }

    fn check(&self, table: &str, index: usize, value: &Value) -> Result<()> {
        let def = &self.columns[index];
        match value.value_type() {
            None if def.nullable => Ok(()),
            None => Err(Error::StorageError(format!(
                "column '{table}.{}' is not nullable",
                def.name
            ))),
            Some(ty) if ty == def.ty => Ok(()),
            Some(ty) => Err(Error::TypeError {
                expected: def.ty.name().into(),
                got: ty.name().into(),
            }),
        }
    }
}

fn table_of<'t>(tables: &'t HashMap<String, Table>, name: &str) -> Result<&'t Table> {
    tables
        .get(name)
        .ok_or_else(|| Error::StorageError(format!("unknown table '{name}'")))
}

/// A node/edge reference must point at a row id owning rows in some table
/// of the matching owner type.
fn check_reference(tables: &HashMap<String, Table>, value: &Value) -> Result<()> {
    let (row, owner) = match value {
        Value::Node(id) => (RowId::from(*id), OwnerType::Node),
        Value::Edge(id) => (RowId::from(*id), OwnerType::Edge),
        _ => return Ok(()),
    };
    let live = tables
        .values()
        .any(|t| t.owner == owner && t.rows.contains_key(&row));
    if live {
        Ok(())
    } else {
        Err(Error::StorageError(format!("dangling reference to {value}")))
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                tables: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                batch: Mutex::new(BatchState::default()),
                stats: Mutex::new(BackendStats::default()),
            }),
        }
    }

    /// Fails unless a change is open. Returns whether it is a removal.
    fn begin_write(&self) -> Result<bool> {
        let batch = self.inner.batch.lock();
        if batch.changes == 0 {
            return Err(Error::TxError("write outside of a change".into()));
        }
        Ok(batch.removals > 0)
    }

    fn count_write(&self) {
        self.inner.stats.lock().writes += 1;
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

impl StorageBackend for MemoryBackend {
    fn define_table(&self, table: &str, owner: OwnerType, columns: &[ColumnDef]) -> Result<()> {
        let mut tables = self.inner.tables.write();
        if let Some(existing) = tables.get(table) {
            if existing.owner == owner && existing.columns == columns {
                return Ok(());
            }
            return Err(Error::StorageError(format!(
                "table '{table}' already defined with a different layout"
            )));
        }
        tables.insert(
            table.to_string(),
            Table {
                owner,
                columns: columns.to_vec(),
                rows: HashMap::new(),
            },
        );
        Ok(())
    }

    fn allocate_id(&self) -> RowId {
        RowId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    fn select(&self, id: RowId, table: &str, column: &str) -> Result<Value> {
        let tables = self.inner.tables.read();
        let def = table_of(&tables, table)?;
        let index = def.column(table, column)?;
        def.rows
            .get(&id)
            .and_then(|rows| rows.first())
            .map(|row| row[index].clone())
            .ok_or_else(|| Error::NotFound(format!("row {id} in table '{table}'")))
    }

    fn select_all(&self, id: RowId, table: &str, column: &str) -> Result<Vec<Value>> {
        let tables = self.inner.tables.read();
        let def = table_of(&tables, table)?;
        let index = def.column(table, column)?;
        Ok(def
            .rows
            .get(&id)
            .map(|rows| rows.iter().map(|row| row[index].clone()).collect())
            .unwrap_or_default())
    }

    fn select_where(&self, table: &str, column: &str, value: &Value) -> Result<Vec<RowId>> {
        // Brute force scan (memory backend doesn't have real column indexes)
        let tables = self.inner.tables.read();
        let def = table_of(&tables, table)?;
        let index = def.column(table, column)?;
        let mut ids: Vec<RowId> = def
            .rows
            .iter()
            .filter(|(_, rows)| rows.iter().any(|row| &row[index] == value))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn has_row(&self, id: RowId, table: &str) -> Result<bool> {
        let tables = self.inner.tables.read();
        Ok(table_of(&tables, table)?.rows.contains_key(&id))
    }

    fn ids(&self, table: &str) -> Result<Vec<RowId>> {
        let tables = self.inner.tables.read();
        let mut ids: Vec<RowId> = table_of(&tables, table)?.rows.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    fn insert(&self, id: RowId, table: &str, columns: &[&str], values: Vec<Value>) -> Result<()> {
        let removing = self.begin_write()?;
        if columns.len() != values.len() {
            return Err(Error::StorageError(format!(
                "insert into '{table}' got {} columns and {} values",
                columns.len(),
                values.len()
            )));
        }

        let mut tables = self.inner.tables.write();
        let row = {
            let def = table_of(&tables, table)?;
            let mut row = vec![Value::Null; def.columns.len()];
            for (column, value) in columns.iter().zip(values) {
                let index = def.column(table, column)?;
                def.check(table, index, &value)?;
                if !removing {
                    check_reference(&tables, &value)?;
                }
                row[index] = value;
            }
            if let Some(missing) = def
                .columns
                .iter()
                .zip(&row)
                .find(|(c, v)| !c.nullable && v.is_null())
            {
                return Err(Error::StorageError(format!(
                    "insert into '{table}' is missing required column '{}'",
                    missing.0.name
                )));
            }
            row
        };

        if let Some(def) = tables.get_mut(table) {
            def.rows.entry(id).or_default().push(row);
        }
        drop(tables);
        self.count_write();
        Ok(())
    }

    fn update(&self, id: RowId, table: &str, column: &str, value: Value) -> Result<()> {
        let removing = self.begin_write()?;
        let mut tables = self.inner.tables.write();
        let index = {
            let def = table_of(&tables, table)?;
            let index = def.column(table, column)?;
            def.check(table, index, &value)?;
            if !removing {
                check_reference(&tables, &value)?;
            }
            index
        };

        let row = tables
            .get_mut(table)
            .and_then(|t| t.rows.get_mut(&id))
            .and_then(|rows| rows.first_mut())
            .ok_or_else(|| Error::NotFound(format!("row {id} in table '{table}'")))?;
        row[index] = value;
        drop(tables);
        self.count_write();
        Ok(())
    }

    fn remove(&self, id: RowId, table: &str) -> Result<usize> {
        self.begin_write()?;
        let mut tables = self.inner.tables.write();
        table_of(&tables, table)?;
        let removed = tables
            .get_mut(table)
            .and_then(|t| t.rows.remove(&id))
            .map_or(0, |rows| rows.len());
        drop(tables);
        if removed > 0 {
            self.count_write();
        }
        Ok(removed)
    }

    fn remove_value(&self, id: RowId, table: &str, column: &str, value: &Value) -> Result<usize> {
        self.begin_write()?;
        let mut tables = self.inner.tables.write();
        let index = {
            let def = table_of(&tables, table)?;
            def.column(table, column)?
        };

        let mut removed = 0;
        if let Some(def) = tables.get_mut(table) {
            if let Some(rows) = def.rows.get_mut(&id) {
                let before = rows.len();
                rows.retain(|row| &row[index] != value);
                removed = before - rows.len();
                if rows.is_empty() {
                    def.rows.remove(&id);
                }
            }
        }
        drop(tables);
        if removed > 0 {
            self.count_write();
        }
        Ok(removed)
    }

    // ========================================================================
    // Batch boundaries
    // ========================================================================

    fn start_change(&self) {
        self.inner.batch.lock().changes += 1;
        trace!("memory backend: change opened");
    }

    fn stop_change(&self) {
        {
            let mut batch = self.inner.batch.lock();
            if batch.changes == 0 {
                return;
            }
            batch.changes -= 1;
            // A removal cascade may be open on another clone.
            if batch.changes < batch.removals {
                batch.removals = batch.changes;
            }
        }
        self.inner.stats.lock().changes += 1;
        trace!("memory backend: change closed");
    }

    fn start_remove(&self) {
        {
            let mut batch = self.inner.batch.lock();
            if batch.removals >= batch.changes {
                return;
            }
            batch.removals += 1;
        }
        self.inner.stats.lock().removals += 1;
    }

    fn query_begin(&self) {
        self.inner.batch.lock().queries += 1;
    }

    fn query_commit(&self) {
        let was_open = {
            let mut batch = self.inner.batch.lock();
            let open = batch.queries > 0;
            batch.queries = batch.queries.saturating_sub(1);
            open
        };
        if was_open {
            self.inner.stats.lock().batches += 1;
        }
    }

    fn stats(&self) -> BackendStats {
        *self.inner.stats.lock()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeId, ValueType};

    fn backend() -> MemoryBackend {
        let db = MemoryBackend::new();
        db.define_table("entity", OwnerType::Node, &[
            ColumnDef::required("name", ValueType::String),
            ColumnDef::optional("best_friend", ValueType::Node),
        ]).unwrap();
        db.define_table("tags", OwnerType::Node, &[
            ColumnDef::required("tag", ValueType::String),
        ]).unwrap();
        db
    }

    fn node(db: &MemoryBackend, name: &str) -> RowId {
        let id = db.allocate_id();
        db.insert(id, "entity", &["name"], vec![Value::from(name)]).unwrap();
        id
    }

    #[test]
    fn test_insert_and_select() {
        let db = backend();
        db.start_change();
        let id = node(&db, "Water");
        db.stop_change();

        assert_eq!(db.select(id, "entity", "name").unwrap(), Value::from("Water"));
        assert_eq!(db.select(id, "entity", "best_friend").unwrap(), Value::Null);
        assert!(matches!(
            db.select(RowId(999), "entity", "name"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_write_outside_change_is_rejected() {
        let db = backend();
        let id = db.allocate_id();
        let result = db.insert(id, "entity", &["name"], vec![Value::from("Ice")]);
        assert!(matches!(result, Err(Error::TxError(_))));
    }

    #[test]
    fn test_schema_is_enforced() {
        let db = backend();
        db.start_change();
        let id = db.allocate_id();
        assert!(matches!(
            db.insert(id, "entity", &["name"], vec![Value::Int(3)]),
            Err(Error::TypeError { .. })
        ));
        assert!(db.insert(id, "entity", &["best_friend"], vec![Value::Null]).is_err());
        assert!(db.insert(id, "entity", &["colour"], vec![Value::from("red")]).is_err());
        assert!(db.insert(id, "nowhere", &["name"], vec![Value::from("x")]).is_err());
        db.stop_change();
    }

    #[test]
    fn test_dangling_reference_allowed_only_while_removing() {
        let db = backend();
        db.start_change();
        let a = node(&db, "A");
        let ghost = Value::Node(NodeId(4242));
        assert!(db.update(a, "entity", "best_friend", ghost.clone()).is_err());
        db.start_remove();
        assert!(db.update(a, "entity", "best_friend", ghost).is_ok());
        db.stop_change();

        let stats = db.stats();
        assert_eq!(stats.changes, 1);
        assert_eq!(stats.removals, 1);
    }

    #[test]
    fn test_multi_row_tables() {
        let db = backend();
        db.start_change();
        let a = node(&db, "A");
        let b = node(&db, "B");
        for tag in ["red", "round", "red"] {
            db.insert(a, "tags", &["tag"], vec![Value::from(tag)]).unwrap();
        }
        db.insert(b, "tags", &["tag"], vec![Value::from("red")]).unwrap();

        assert_eq!(db.select_all(a, "tags", "tag").unwrap().len(), 3);
        assert_eq!(db.select_where("tags", "tag", &Value::from("red")).unwrap(), vec![a, b]);

        assert_eq!(db.remove_value(a, "tags", "tag", &Value::from("red")).unwrap(), 2);
        assert_eq!(db.select_all(a, "tags", "tag").unwrap(), vec![Value::from("round")]);
        assert_eq!(db.remove(b, "tags").unwrap(), 1);
        assert!(!db.has_row(b, "tags").unwrap());
        db.stop_change();
    }

    #[test]
    fn test_clones_overlap_changes() {
        let db = backend();
        let other = db.clone();
        db.start_change();
        other.start_change();
        node(&other, "B");
        other.stop_change();

        // The first change is still open.
        node(&db, "A");
        db.stop_change();
        assert!(matches!(
            db.insert(db.allocate_id(), "entity", &["name"], vec![Value::from("C")]),
            Err(Error::TxError(_))
        ));
        assert_eq!(db.stats().changes, 2);
    }

    #[test]
    fn test_batches_are_counted() {
        let db = backend();
        db.query_begin();
        db.query_commit();
        db.query_commit();
        assert_eq!(db.stats().batches, 1);
    }

    #[test]
    fn test_redefining_table_must_match() {
        let db = backend();
        assert!(db.define_table("tags", OwnerType::Node, &[
            ColumnDef::required("tag", ValueType::String),
        ]).is_ok());
        assert!(db.define_table("tags", OwnerType::Edge, &[]).is_err());
    }
}
