// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Access to the partitioned key-value store shared with the scan engine.
//!
//! The store is split into numbered indices. Index 0 holds the registry of
//! indices in use, every scan allocates its own main index and the engine
//! allocates one more index per scanned host. Writes are visible to every other
//! connection selecting the same index immediately; there is no further
//! synchronisation between the orchestrator and the engine.

mod error;
pub mod inmemory;
pub mod redis;

pub use error::{DbError, StoreResult};

/// Handle into one partition of the keyed store.
pub type ScanIndex = u32;

/// Operations on a single connection to the keyed store.
///
/// A connection always works on exactly one selected index. All single value and
/// list operations apply to that index until another one is selected.
pub trait KeyedStore: Send {
    /// Reserves an index that is currently not in use and selects it.
    ///
    /// Returns [DbError::NoAvailDbErr] when every index is taken.
    fn allocate_index(&mut self) -> StoreResult<ScanIndex>;

    /// Rebinds this connection to the given index.
    fn select(&mut self, index: ScanIndex) -> StoreResult<()>;

    /// The currently selected index.
    fn index(&self) -> ScanIndex;

    /// Returns the most recently stored value of a key.
    fn get(&mut self, key: &str) -> StoreResult<Option<String>>;

    /// Replaces all values of a key with the given one.
    fn set(&mut self, key: &str, value: &str) -> StoreResult<()>;

    /// Adds a value to the list stored under key without touching existing entries.
    fn append(&mut self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes and returns the oldest value of a list.
    ///
    /// An empty or missing list is the normal "nothing new yet" case and returns `None`.
    fn pop(&mut self, key: &str) -> StoreResult<Option<String>>;

    /// Returns all values of a list in insertion order.
    fn enumerate(&mut self, key: &str) -> StoreResult<Vec<String>>;

    /// Removes every occurrence of value from the list stored under key.
    fn remove_item(&mut self, key: &str, value: &str) -> StoreResult<()>;

    /// Clears all keys of an index and returns it to the free pool.
    ///
    /// The store does not guard against releasing the same index twice; callers
    /// have to track that themselves. The selected index is not changed.
    fn release(&mut self, index: ScanIndex) -> StoreResult<()>;

    /// Appends each value in order.
    fn append_all(&mut self, key: &str, values: &[String]) -> StoreResult<()> {
        for value in values {
            self.append(key, value)?;
        }
        Ok(())
    }

    /// Pops until the list is drained, oldest first.
    fn pop_all(&mut self, key: &str) -> StoreResult<Vec<String>> {
        let mut result = Vec::new();
        while let Some(value) = self.pop(key)? {
            result.push(value);
        }
        Ok(result)
    }
}

/// Creates new connections to a keyed store.
///
/// Each scan worker owns its connection, so that selecting an index never
/// interferes with another worker.
pub trait StoreConnector: Send + Sync + 'static {
    type Store: KeyedStore + 'static;

    /// Opens a new connection with index 0 selected.
    fn connect(&self) -> StoreResult<Self::Store>;
}
