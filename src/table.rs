//! Table implementation
//!
//! A table is a named key-value map guarded by an exclusive lock, plus a
//! proposed (shadow) overlay that holds a transaction's uncommitted writes.
//!
//! ## Concurrency Model
//!
//! All access to a table's maps goes through a [`TableGuard`], obtained
//! with [`Table::lock`] (blocking, non-transactional reads/writes) or
//! [`Table::try_lock`] (non-blocking, used inside transactions so a
//! connection never waits on a table another transaction holds). The guard
//! is an owned `parking_lot` guard, so a transaction can keep a table
//! locked across many request/response cycles and the lock is still
//! released on every exit path when the guard drops.
//!
//! ## Shadow Writes
//!
//! Non-transactional writes land in the committed map directly.
//! Transactional writes land only in the proposed map; `commit` merges
//! proposed entries into the committed map (proposed wins on collision) and
//! `rollback` discards them. Reads consult proposed before committed, so a
//! transaction sees its own uncommitted writes while every other connection
//! sees only committed state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

/// Key-value state guarded by the table lock
#[derive(Debug, Default)]
struct TableState {
    /// Committed entries, visible to all connections
    committed: HashMap<String, String>,

    /// Proposed entries, populated only while a transaction holds the table
    proposed: HashMap<String, String>,
}

/// A named key-value table with an exclusive lock and shadow-write support
#[derive(Debug)]
pub struct Table {
    /// Table name; unique within the directory, immutable after creation
    name: String,

    /// Lock plus guarded state; `Arc` so guards can be held as owned values
    state: Arc<Mutex<TableState>>,
}

impl Table {
    /// Create an empty table with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(TableState::default())),
        }
    }

    /// The table's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocking acquire of the table's exclusive lock
    ///
    /// Used by non-transactional GET/SET; blocks until the current holder
    /// (possibly a transaction) releases the table.
    pub fn lock(&self) -> TableGuard {
        TableGuard {
            guard: self.state.lock_arc(),
        }
    }

    /// Non-blocking acquire attempt
    ///
    /// Used exclusively inside transactions; a table already held by anyone
    /// (including this connection) fails immediately rather than queuing.
    pub fn try_lock(&self) -> Option<TableGuard> {
        self.state.try_lock_arc().map(|guard| TableGuard { guard })
    }
}

/// Exclusive access to a table's maps; the lock is released on drop
pub struct TableGuard {
    guard: ArcMutexGuard<RawMutex, TableState>,
}

impl TableGuard {
    /// Look up a key, consulting proposed entries before committed ones
    ///
    /// The proposed map is checked first so a transaction reads its own
    /// uncommitted writes.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.guard
            .proposed
            .get(key)
            .or_else(|| self.guard.committed.get(key))
            .map(String::as_str)
    }

    /// True if the key is present in either map
    pub fn has_key(&self, key: &str) -> bool {
        self.guard.proposed.contains_key(key) || self.guard.committed.contains_key(key)
    }

    /// Write directly into the committed map (non-transactional path)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.guard.committed.insert(key.into(), value.into());
    }

    /// Write into the proposed map only (transactional path)
    ///
    /// Invisible to other connections until [`commit`](Self::commit).
    pub fn propose_set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.guard.proposed.insert(key.into(), value.into());
    }

    /// Merge every proposed entry into the committed map and clear the
    /// proposed map; proposed values win on key collision
    pub fn commit(&mut self) {
        let proposed = std::mem::take(&mut self.guard.proposed);
        for (key, value) in proposed {
            self.guard.committed.insert(key, value);
        }
    }

    /// Discard the proposed map unconditionally
    pub fn rollback(&mut self) {
        self.guard.proposed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let table = Table::new("t");
        let mut guard = table.lock();
        guard.set("k", "v");
        assert_eq!(guard.get("k"), Some("v"));
        assert!(guard.has_key("k"));
        assert!(!guard.has_key("missing"));
    }

    #[test]
    fn proposed_wins_over_committed() {
        let table = Table::new("t");
        let mut guard = table.lock();
        guard.set("k", "old");
        guard.propose_set("k", "new");
        assert_eq!(guard.get("k"), Some("new"));
    }

    #[test]
    fn commit_merges_proposed_entries() {
        let table = Table::new("t");
        let mut guard = table.lock();
        guard.set("a", "1");
        guard.propose_set("a", "2");
        guard.propose_set("b", "3");
        guard.commit();
        assert_eq!(guard.get("a"), Some("2"));
        assert_eq!(guard.get("b"), Some("3"));
        // Rollback after commit has nothing left to discard
        guard.rollback();
        assert_eq!(guard.get("a"), Some("2"));
    }

    #[test]
    fn rollback_discards_proposed_entries() {
        let table = Table::new("t");
        let mut guard = table.lock();
        guard.set("a", "1");
        guard.propose_set("a", "2");
        guard.propose_set("b", "3");
        guard.rollback();
        assert_eq!(guard.get("a"), Some("1"));
        assert!(!guard.has_key("b"));
    }

    #[test]
    fn try_lock_fails_while_held() {
        let table = Table::new("t");
        let guard = table.lock();
        assert!(table.try_lock().is_none());
        drop(guard);
        assert!(table.try_lock().is_some());
    }
}
