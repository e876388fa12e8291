use super::{Attributes, EntityRegistry, MockError};
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;
use std::ops::{Deref, DerefMut};

#[derive(Debug)]
struct Table {
    primary_key: String,
    next_id: u64,
    rows: Vec<Attributes>,
}

/// A disposable in-memory data store.
///
/// Tables are created up front by [`ScratchStore::migrate`]; inserting into
/// an unknown table is an error. Primary keys are assigned from a per-table
/// counter when a row does not carry one.
#[derive(Debug, Default)]
pub struct ScratchStore {
    tables: IndexMap<String, Table>,
    pivots: IndexMap<String, Vec<Attributes>>,
    sequence: u64,
}

impl ScratchStore {
    /// Creates one empty table per registered entity.
    pub fn migrate(registry: &EntityRegistry) -> Self {
        let mut store = ScratchStore::default();
        for def in registry.iter() {
            store.tables.insert(
                def.table.clone(),
                Table {
                    primary_key: def.primary_key.clone(),
                    next_id: 1,
                    rows: Vec::new(),
                },
            );
        }
        debug!("Migrated scratch store with {} tables", store.tables.len());
        store
    }

    /// Next factory sequence number, starting at 1.
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut Table, MockError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| MockError::Store(format!("no such table: {}", table)))
    }

    /// Stores a row and returns it with its primary key set.
    ///
    /// A counter key is assigned only when the key column is absent or null;
    /// any other value the row carries is kept.
    pub fn insert(&mut self, table: &str, mut attributes: Attributes) -> Result<Attributes, MockError> {
        let table = self.table_mut(table)?;
        match attributes.get(&table.primary_key) {
            None | Some(Value::Null) => {
                let id = table.next_id;
                table.next_id += 1;
                attributes.shift_remove(&table.primary_key);
                attributes.shift_insert(0, table.primary_key.clone(), Value::from(id));
            }
            Some(key) => {
                if let Some(id) = key.as_u64() {
                    table.next_id = table.next_id.max(id.saturating_add(1));
                }
            }
        }
        table.rows.push(attributes.clone());
        Ok(attributes)
    }

    /// Sets `changes` on the row keyed by `key`.
    pub fn update(&mut self, table: &str, key: &Value, changes: Attributes) -> Result<Attributes, MockError> {
        let name = table.to_string();
        let table = self.table_mut(table)?;
        let primary_key = table.primary_key.clone();
        let row = table
            .rows
            .iter_mut()
            .find(|row| row.get(&primary_key) == Some(key))
            .ok_or_else(|| MockError::Store(format!("no row {} in {}", key, name)))?;
        row.extend(changes);
        Ok(row.clone())
    }

    pub fn find(&self, table: &str, key: &Value) -> Option<&Attributes> {
        let table = self.tables.get(table)?;
        table.rows.iter().find(|row| row.get(&table.primary_key) == Some(key))
    }

    /// Rows whose columns equal every given value, in insertion order.
    pub fn where_all(&self, table: &str, conditions: &[(&str, &Value)]) -> Vec<&Attributes> {
        let Some(table) = self.tables.get(table) else {
            return Vec::new();
        };
        table
            .rows
            .iter()
            .filter(|row| conditions.iter().all(|(column, value)| row.get(*column) == Some(*value)))
            .collect()
    }

    /// Adds a join row; pivot tables are created on first use.
    pub fn attach(&mut self, pivot: &str, row: Attributes) {
        self.pivots.entry(pivot.to_string()).or_default().push(row);
    }

    pub fn pivot_rows(&self, pivot: &str) -> &[Attributes] {
        self.pivots.get(pivot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn truncate(&mut self) {
        self.tables.clear();
        self.pivots.clear();
        self.sequence = 0;
    }
}

/// Owns a migrated [`ScratchStore`] and tears it down when dropped,
/// including during unwinding.
pub struct StoreScope {
    store: ScratchStore,
}

impl StoreScope {
    pub fn open(registry: &EntityRegistry) -> Self {
        Self {
            store: ScratchStore::migrate(registry),
        }
    }
}

impl Deref for StoreScope {
    type Target = ScratchStore;

    fn deref(&self) -> &ScratchStore {
        &self.store
    }
}

impl DerefMut for StoreScope {
    fn deref_mut(&mut self) -> &mut ScratchStore {
        &mut self.store
    }
}

impl Drop for StoreScope {
    fn drop(&mut self) {
        debug!("Tearing down scratch store ({} tables)", self.store.tables.len());
        self.store.truncate();
    }
}

/// Runs `f` against a fresh store migrated for `registry`.
pub fn with_scratch_store<T>(registry: &EntityRegistry, f: impl FnOnce(&mut ScratchStore) -> T) -> T {
    let mut scope = StoreScope::open(registry);
    f(&mut *scope)
}
