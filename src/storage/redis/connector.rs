// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::fmt::Debug;

use redis::{Cmd, Commands, Connection};

use crate::storage::{DbError, KeyedStore, ScanIndex, StoreConnector, StoreResult};

/// Key marking the database that holds the engine's VT cache.
pub const CACHE_KEY: &str = "nvticache";
const DB_INDEX: &str = "GVM.__GlobalDBIndex";

#[derive(Debug, PartialEq, Eq)]
/// Defines how the RedisCtx should select the namespace
pub enum NameSpaceSelector {
    /// Defines to use a fix DB
    Fix(u32),
    /// Next free
    Free,
    /// Uses a DB that contains this key
    Key(&'static str),
}

impl NameSpaceSelector {
    fn max_db(kb: &mut Connection) -> StoreResult<u32> {
        Cmd::new()
            .arg("CONFIG")
            .arg("GET")
            .arg("databases")
            .query::<(String, u32)>(kb)
            .map(|(_, max_db)| max_db)
            .map_err(|e| e.into())
    }

    fn select_namespace(kb: &mut Connection, idx: u32) -> StoreResult<()> {
        Cmd::new()
            .arg("SELECT")
            .arg(idx)
            .query(kb)
            .map_err(|e| e.into())
    }

    fn select(&self, kb: &mut Connection) -> StoreResult<u32> {
        match self {
            NameSpaceSelector::Fix(dbi) => {
                Self::select_namespace(kb, *dbi)?;
                Ok(*dbi)
            }
            NameSpaceSelector::Free => {
                let max_db = Self::max_db(kb)?;
                Self::select_namespace(kb, 0)?;
                for dbi in 1..max_db {
                    match kb.hset_nx(DB_INDEX, dbi, 1) {
                        Ok(1) => {
                            Self::select_namespace(kb, dbi)?;
                            return Ok(dbi);
                        }
                        Ok(_) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
                Err(DbError::NoAvailDbErr)
            }
            NameSpaceSelector::Key(key) => {
                let max_db = Self::max_db(kb)?;
                for dbi in 1..max_db {
                    Self::select_namespace(kb, dbi)?;
                    match kb.exists(key) {
                        Ok(1) => return Ok(dbi),
                        Ok(_) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
                Err(DbError::NoAvailDbErr)
            }
        }
    }
}

pub struct RedisCtx {
    kb: Connection,
    pub db: u32,
}

impl Debug for RedisCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Redis connection. Db {}", self.db)
    }
}

impl RedisCtx {
    /// Connects and selects the first database a selector resolves to.
    ///
    /// The address must be a complete url including the used protocol e.g.:
    /// `"unix:///run/redis/redis-server.sock"`.
    pub fn open(address: &str, selector: &[NameSpaceSelector]) -> StoreResult<Self> {
        let client = redis::Client::open(address)?;

        let mut kb = client.get_connection()?;
        for s in selector {
            match s.select(&mut kb) {
                Ok(x) => return Ok(RedisCtx { kb, db: x }),
                Err(DbError::NoAvailDbErr) => {}
                Err(x) => return Err(x),
            }
        }
        Err(DbError::NoAvailDbErr)
    }

    /// Returns all values of a list in the order redis stores them.
    pub(super) fn lrange(&mut self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self.kb.lrange(key, 0, -1)?)
    }

    pub(super) fn keys(&mut self, pattern: &str) -> StoreResult<Vec<String>> {
        Ok(self.kb.keys(pattern)?)
    }
}

/// Values are pushed to the head of a list, the same way the engine writes
/// its lists, so the oldest entry is always at the tail.
impl KeyedStore for RedisCtx {
    fn allocate_index(&mut self) -> StoreResult<ScanIndex> {
        self.db = NameSpaceSelector::Free.select(&mut self.kb)?;
        tracing::trace!(index = self.db, "allocated redis database");
        Ok(self.db)
    }

    fn select(&mut self, index: ScanIndex) -> StoreResult<()> {
        self.db = NameSpaceSelector::Fix(index).select(&mut self.kb)?;
        Ok(())
    }

    fn index(&self) -> ScanIndex {
        self.db
    }

    fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.kb.lindex(key, 0)?)
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(key)
            .ignore()
            .cmd("LPUSH")
            .arg(key)
            .arg(value)
            .ignore()
            .query::<()>(&mut self.kb)?;
        Ok(())
    }

    fn append(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.kb.lpush(key, value).map_err(|e| e.into())
    }

    fn pop(&mut self, key: &str) -> StoreResult<Option<String>> {
        Ok(Cmd::new().arg("RPOP").arg(key).query(&mut self.kb)?)
    }

    fn enumerate(&mut self, key: &str) -> StoreResult<Vec<String>> {
        let mut values = self.lrange(key)?;
        // Since items are lpushed, the returned vector must be reversed to keep the order.
        values.reverse();
        Ok(values)
    }

    fn remove_item(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.kb.lrem(key, 0, value).map_err(|e| e.into())
    }

    fn release(&mut self, index: ScanIndex) -> StoreResult<()> {
        redis::pipe()
            .cmd("SELECT")
            .arg(index)
            .ignore()
            .cmd("FLUSHDB")
            .ignore()
            .cmd("SELECT")
            .arg(0)
            .ignore()
            .cmd("HDEL")
            .arg(DB_INDEX)
            .arg(index)
            .ignore()
            .cmd("SELECT")
            .arg(self.db)
            .ignore()
            .query::<()>(&mut self.kb)?;
        tracing::trace!(index, "released redis database");
        Ok(())
    }
}

/// Opens connections to the redis instance at `url`.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    url: String,
}

impl RedisConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl StoreConnector for RedisConnector {
    type Store = RedisCtx;

    fn connect(&self) -> StoreResult<RedisCtx> {
        tracing::trace!(url = &self.url, "connecting to redis");
        RedisCtx::open(&self.url, &[NameSpaceSelector::Fix(0)])
    }
}
