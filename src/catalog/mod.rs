// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! In-memory catalog of VT metadata.
//!
//! A [VtCatalog] is never changed after it has been loaded. Scans take a
//! snapshot when they start and keep it until they end, a reload builds a new
//! catalog and swaps it in through the [CatalogHandle].

mod severity;
mod vt;

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

pub use severity::{CVSS_BASE_V2, cvss_base_v2};
pub use vt::{
    ParameterType, QodType, Severity, UnknownParameterType, VtParameter, VtRecord, VtReference,
};

use crate::storage::StoreResult;

/// Version of a feed. A version of 0 means that no feed is known.
pub type FeedVersion = u64;

/// Parses a version token, e.g. `202405071034`. Quotes are ignored.
pub fn parse_feed_version(value: &str) -> Option<FeedVersion> {
    value.trim().trim_matches('"').parse().ok()
}

/// All VTs of one feed version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VtCatalog {
    pub version: FeedVersion,
    vts: HashMap<String, VtRecord>,
}

impl VtCatalog {
    pub fn new(version: FeedVersion, vts: impl IntoIterator<Item = VtRecord>) -> Self {
        Self {
            version,
            vts: vts.into_iter().map(|vt| (vt.oid.clone(), vt)).collect(),
        }
    }

    pub fn get(&self, oid: &str) -> Option<&VtRecord> {
        self.vts.get(oid)
    }

    pub fn contains(&self, oid: &str) -> bool {
        self.vts.contains_key(oid)
    }

    pub fn len(&self) -> usize {
        self.vts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vts.is_empty()
    }

    /// OIDs of all VTs of a family, sorted.
    pub fn family(&self, family: &str) -> Vec<&str> {
        let mut oids: Vec<&str> = self
            .vts
            .values()
            .filter(|vt| vt.family == family)
            .map(|vt| vt.oid.as_str())
            .collect();
        oids.sort_unstable();
        oids
    }
}

/// Shared access to the current catalog.
///
/// Cloning the handle shares the catalog, replacing it is visible to every clone.
#[derive(Debug, Clone, Default)]
pub struct CatalogHandle {
    current: Arc<RwLock<Arc<VtCatalog>>>,
}

impl CatalogHandle {
    pub fn new(catalog: VtCatalog) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    /// The catalog as it is right now. Later replacements do not affect the returned snapshot.
    pub fn snapshot(&self) -> Arc<VtCatalog> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn version(&self) -> FeedVersion {
        self.snapshot().version
    }

    pub fn replace(&self, catalog: VtCatalog) {
        let catalog = Arc::new(catalog);
        match self.current.write() {
            Ok(mut current) => *current = catalog,
            Err(poisoned) => *poisoned.into_inner() = catalog,
        }
    }
}

/// Where the catalog is loaded from.
pub trait CatalogSource: Send + Sync + 'static {
    /// Version of the feed the source currently holds; `None` when it holds none.
    fn version(&self) -> StoreResult<Option<FeedVersion>>;

    /// Loads the complete catalog.
    fn load(&self) -> StoreResult<VtCatalog>;
}

/// A source that hands out whatever catalog was put into it last.
#[derive(Debug, Default)]
pub struct InMemoryCatalogSource {
    catalog: RwLock<VtCatalog>,
}

impl InMemoryCatalogSource {
    pub fn new(catalog: VtCatalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
        }
    }

    pub fn set(&self, catalog: VtCatalog) -> StoreResult<()> {
        *self.catalog.write()? = catalog;
        Ok(())
    }
}

impl CatalogSource for InMemoryCatalogSource {
    fn version(&self) -> StoreResult<Option<FeedVersion>> {
        let version = self.catalog.read()?.version;
        Ok((version != 0).then_some(version))
    }

    fn load(&self) -> StoreResult<VtCatalog> {
        Ok(self.catalog.read()?.clone())
    }
}
