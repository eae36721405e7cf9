// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Keyed store backed by the redis instance the engine uses.
//!
//! Every redis database is one index. The hash `GVM.__GlobalDBIndex` in
//! database 0 records which databases are in use.

mod connector;
mod nvt;

pub use connector::{CACHE_KEY, NameSpaceSelector, RedisConnector, RedisCtx};
pub use nvt::RedisCatalogSource;
