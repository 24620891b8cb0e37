//! Table directory
//!
//! The server-wide registry mapping table names to tables.
//!
//! ## Concurrency
//!
//! The name map is guarded by a single directory mutex; creation and lookup
//! both run under it, so two concurrent CREATEs for the same name can never
//! both succeed and a lookup never observes a half-registered table.
//! Tables live for the lifetime of the process and are never deleted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use crate::table::Table;

/// Registry of all tables, owned by the server
#[derive(Debug, Default)]
pub struct TableDirectory {
    tables: Mutex<HashMap<String, Arc<Table>>>,
}

impl TableDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a new table
    ///
    /// Fails with a recoverable error if the name is already taken.
    pub fn create_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        if tables.contains_key(name) {
            return Err(StoreError::failed(format!("table {name} already exists")));
        }
        tables.insert(name.to_string(), Arc::new(Table::new(name)));
        Ok(())
    }

    /// Look up a table by name
    pub fn find_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.lock().get(name).cloned()
    }

    /// Number of registered tables
    pub fn table_count(&self) -> usize {
        self.tables.lock().len()
    }
}
