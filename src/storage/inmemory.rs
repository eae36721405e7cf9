// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Keyed store kept in process memory.
//!
//! All connections created by one [InMemoryConnector] share the same
//! partitions, so it behaves like a single redis instance with a fixed number
//! of databases.

use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use super::{DbError, KeyedStore, ScanIndex, StoreConnector, StoreResult};

/// Number of indices redis provides with its default configuration.
pub const DEFAULT_MAX_INDEX: ScanIndex = 16;

type Partition = HashMap<String, VecDeque<String>>;

#[derive(Debug, Default)]
struct Partitions {
    in_use: BTreeSet<ScanIndex>,
    data: HashMap<ScanIndex, Partition>,
}

/// Creates connections sharing one set of partitions.
#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    shared: Arc<Mutex<Partitions>>,
    max_index: ScanIndex,
}

impl Default for InMemoryConnector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INDEX)
    }
}

impl InMemoryConnector {
    /// Indices `1..max_index` are available for allocation.
    pub fn new(max_index: ScanIndex) -> Self {
        Self {
            shared: Default::default(),
            max_index,
        }
    }

    /// Returns the indices that are currently allocated.
    pub fn in_use(&self) -> StoreResult<Vec<ScanIndex>> {
        Ok(self.shared.lock()?.in_use.iter().copied().collect())
    }

    /// Marks an index as used without selecting it, the way the engine does for host indices.
    pub fn reserve(&self, index: ScanIndex) -> StoreResult<bool> {
        Ok(self.shared.lock()?.in_use.insert(index))
    }
}

impl StoreConnector for InMemoryConnector {
    type Store = InMemoryStore;

    fn connect(&self) -> StoreResult<InMemoryStore> {
        Ok(InMemoryStore {
            shared: self.shared.clone(),
            max_index: self.max_index,
            selected: 0,
        })
    }
}

/// A single connection; see [InMemoryConnector].
#[derive(Debug)]
pub struct InMemoryStore {
    shared: Arc<Mutex<Partitions>>,
    max_index: ScanIndex,
    selected: ScanIndex,
}

impl InMemoryStore {
    fn lock(&self) -> StoreResult<MutexGuard<'_, Partitions>> {
        self.shared
            .lock()
            .map_err(|e| DbError::PoisonedLock(format!("{e:?}")))
    }

    fn with_partition<T>(&self, f: impl FnOnce(&mut Partition) -> T) -> StoreResult<T> {
        let mut partitions = self.lock()?;
        let partition = partitions.data.entry(self.selected).or_default();
        Ok(f(partition))
    }
}

impl KeyedStore for InMemoryStore {
    fn allocate_index(&mut self) -> StoreResult<ScanIndex> {
        let index = {
            let mut partitions = self.lock()?;
            let free = (1..self.max_index).find(|i| !partitions.in_use.contains(i));
            match free {
                Some(index) => {
                    partitions.in_use.insert(index);
                    index
                }
                None => return Err(DbError::NoAvailDbErr),
            }
        };
        self.selected = index;
        Ok(index)
    }

    fn select(&mut self, index: ScanIndex) -> StoreResult<()> {
        if index >= self.max_index {
            return Err(DbError::Configuration(format!(
                "index {index} exceeds the {} available databases",
                self.max_index
            )));
        }
        self.selected = index;
        Ok(())
    }

    fn index(&self) -> ScanIndex {
        self.selected
    }

    fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        self.with_partition(|p| p.get(key).and_then(|values| values.back().cloned()))
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.with_partition(|p| {
            p.insert(key.to_owned(), VecDeque::from([value.to_owned()]));
        })
    }

    fn append(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.with_partition(|p| {
            p.entry(key.to_owned()).or_default().push_back(value.to_owned());
        })
    }

    fn pop(&mut self, key: &str) -> StoreResult<Option<String>> {
        self.with_partition(|p| {
            let values = p.get_mut(key)?;
            let result = values.pop_front();
            if values.is_empty() {
                p.remove(key);
            }
            result
        })
    }

    fn enumerate(&mut self, key: &str) -> StoreResult<Vec<String>> {
        self.with_partition(|p| {
            p.get(key)
                .map(|values| values.iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    fn remove_item(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.with_partition(|p| {
            if let Some(values) = p.get_mut(key) {
                values.retain(|v| v != value);
                if values.is_empty() {
                    p.remove(key);
                }
            }
        })
    }

    fn release(&mut self, index: ScanIndex) -> StoreResult<()> {
        let mut partitions = self.lock()?;
        partitions.data.remove(&index);
        partitions.in_use.remove(&index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_distinct_indices_until_exhausted() {
        let connector = InMemoryConnector::new(3);
        let mut a = connector.connect().unwrap();
        let mut b = connector.connect().unwrap();
        assert_eq!(a.allocate_index().unwrap(), 1);
        assert_eq!(b.allocate_index().unwrap(), 2);
        let mut c = connector.connect().unwrap();
        assert!(matches!(c.allocate_index(), Err(DbError::NoAvailDbErr)));
        a.release(1).unwrap();
        assert_eq!(c.allocate_index().unwrap(), 1);
    }

    #[test]
    fn writes_are_visible_to_other_connections() {
        let connector = InMemoryConnector::default();
        let mut writer = connector.connect().unwrap();
        let index = writer.allocate_index().unwrap();
        writer.set("internal/abc", "new").unwrap();

        let mut reader = connector.connect().unwrap();
        assert_eq!(reader.get("internal/abc").unwrap(), None);
        reader.select(index).unwrap();
        assert_eq!(reader.get("internal/abc").unwrap(), Some("new".into()));
        writer.set("internal/abc", "ready").unwrap();
        assert_eq!(reader.get("internal/abc").unwrap(), Some("ready".into()));
    }

    #[test]
    fn pop_returns_oldest_first() {
        let connector = InMemoryConnector::default();
        let mut store = connector.connect().unwrap();
        store.allocate_index().unwrap();
        assert_eq!(store.pop("internal/results").unwrap(), None);
        store.append("internal/results", "first").unwrap();
        store.append("internal/results", "second").unwrap();
        assert_eq!(
            store.enumerate("internal/results").unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
        assert_eq!(store.pop("internal/results").unwrap(), Some("first".into()));
        assert_eq!(store.pop_all("internal/results").unwrap(), vec!["second"]);
        assert_eq!(store.pop("internal/results").unwrap(), None);
    }

    #[test]
    fn released_index_reads_as_empty() {
        let connector = InMemoryConnector::default();
        let mut store = connector.connect().unwrap();
        let index = store.allocate_index().unwrap();
        store.set("internal/scan_id", "abc").unwrap();
        store.append("internal/dbindex", "4").unwrap();
        store.release(index).unwrap();

        assert!(connector.in_use().unwrap().is_empty());
        assert_eq!(store.get("internal/scan_id").unwrap(), None);
        assert!(store.enumerate("internal/dbindex").unwrap().is_empty());
    }

    #[test]
    fn remove_item_drops_every_occurrence() {
        let connector = InMemoryConnector::default();
        let mut store = connector.connect().unwrap();
        store.allocate_index().unwrap();
        for v in ["2", "3", "2"] {
            store.append("internal/dbindex", v).unwrap();
        }
        store.remove_item("internal/dbindex", "2").unwrap();
        assert_eq!(store.enumerate("internal/dbindex").unwrap(), vec!["3"]);
    }
}
