// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Reads the VT cache the engine keeps in redis.
//!
//! VT metadata is stored under two different keys
//! - 'nvt:<OID>': stores the general metadata ordered following the KbNvtPos indexes
//! - 'oid:<OID>:prefs': stores the plugins preferences, including the script_timeout
//!   (which is especial and uses preferences id 0)
//!
//! Additionally 'filename:<FILENAME>' maps a script filename to its OID, which is
//! needed to resolve dependencies.

use std::collections::BTreeMap;

use itertools::Itertools;

use super::connector::{CACHE_KEY, NameSpaceSelector, RedisCtx};
use crate::catalog::{
    CVSS_BASE_V2, CatalogSource, FeedVersion, QodType, Severity, VtCatalog, VtParameter, VtRecord,
    VtReference, parse_feed_version,
};
use crate::storage::{DbError, KeyedStore, StoreResult};

// Position of each field in the 'nvt:<OID>' list.
#[allow(dead_code)]
enum KbNvtPos {
    Filename,
    RequiredKeys,
    MandatoryKeys,
    ExcludedKeys,
    RequiredUDPPorts,
    RequiredPorts,
    Dependencies,
    Tags,
    Cves,
    Bids,
    Xrefs,
    Category,
    Family,
    Name,
}

const NVT_FIELDS: usize = KbNvtPos::Name as usize + 1;

/// Loads the catalog from the database holding the `nvticache` key.
#[derive(Debug, Clone)]
pub struct RedisCatalogSource {
    url: String,
}

impl RedisCatalogSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Connects to the cache database; `None` when the engine has not created one yet.
    fn open(&self) -> StoreResult<Option<RedisCtx>> {
        match RedisCtx::open(&self.url, &[NameSpaceSelector::Key(CACHE_KEY)]) {
            Ok(ctx) => Ok(Some(ctx)),
            Err(DbError::NoAvailDbErr) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|x| !x.is_empty())
}

fn references(bids: &str, cves: &str, xrefs: &str, oid: &str) -> Vec<VtReference> {
    let reference = |class: &str, id: &str| VtReference {
        class: class.to_owned(),
        id: id.to_owned(),
    };
    let mut refs: Vec<VtReference> = split_list(bids).map(|r| reference("bid", r)).collect();
    refs.extend(split_list(cves).map(|r| reference("cve", r)));
    // Some references include a comma. Therefore the refs separator is ", ".
    for xref in xrefs.split(", ").filter(|x| !x.is_empty()) {
        match xref.split_once(':') {
            Some((class, id)) => refs.push(reference(class, id)),
            None => tracing::warn!(oid, xref, "reference without type, skipping it"),
        }
    }
    refs
}

fn tags(tags: &str) -> BTreeMap<String, String> {
    tags.split('|')
        .filter_map(|x| x.split_once('='))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

fn timestamp(oid: &str, tag: &str, value: Option<String>) -> Option<i64> {
    let value = value?;
    match value.parse() {
        Ok(x) => Some(x),
        Err(_) => {
            tracing::warn!(oid, tag, %value, "invalid timestamp, skipping it");
            None
        }
    }
}

fn parameters(ctx: &mut RedisCtx, oid: &str) -> StoreResult<BTreeMap<u16, VtParameter>> {
    let mut result = BTreeMap::new();
    for p in ctx.lrange(&format!("oid:{oid}:prefs"))? {
        let Some((id, name, class, default)) = p
            .splitn(4, "|||")
            .collect_tuple::<(&str, &str, &str, &str)>()
        else {
            tracing::warn!(oid, preference = %p, "malformed preference, skipping it");
            continue;
        };
        match (id.parse::<u16>(), class.parse()) {
            (Ok(id), Ok(param_type)) => {
                result.insert(
                    id,
                    VtParameter {
                        id,
                        name: name.to_owned(),
                        param_type,
                        default: default.to_owned(),
                    },
                );
            }
            _ => tracing::warn!(oid, preference = %p, "invalid preference, skipping it"),
        }
    }
    Ok(result)
}

fn dependencies(ctx: &mut RedisCtx, oid: &str, filenames: &str) -> StoreResult<Vec<String>> {
    let mut result = Vec::new();
    for filename in split_list(filenames) {
        // The OID is the second item, the first one is the upload timestamp.
        match ctx.lrange(&format!("filename:{filename}"))?.into_iter().nth(1) {
            Some(dependency) => result.push(dependency),
            None => tracing::debug!(oid, filename, "dependency not found in cache"),
        }
    }
    Ok(result)
}

fn record(ctx: &mut RedisCtx, oid: &str) -> StoreResult<Option<VtRecord>> {
    let nvt_data = ctx.lrange(&format!("nvt:{oid}"))?;
    if nvt_data.is_empty() {
        return Ok(None);
    }
    if nvt_data.len() < NVT_FIELDS {
        tracing::warn!(oid, fields = nvt_data.len(), "incomplete VT metadata, skipping it");
        return Ok(None);
    }
    let field = |pos: KbNvtPos| nvt_data[pos as usize].as_str();

    let mut custom = tags(field(KbNvtPos::Tags));
    let vector = custom
        .remove("severity_vector")
        .or_else(|| custom.remove("cvss_base_vector"))
        .filter(|v| !v.is_empty());
    let severity_type = custom
        .remove("severity_type")
        .or_else(|| vector.as_ref().map(|_| CVSS_BASE_V2.to_owned()));
    let severity = Severity {
        vector,
        severity_type,
        origin: custom.remove("severity_origin"),
        date: timestamp(oid, "severity_date", custom.remove("severity_date")),
    };
    let qod_type = match custom.remove("qod_type") {
        Some(t) => match t.parse::<QodType>() {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::warn!(oid, error = %e, "ignoring qod_type");
                None
            }
        },
        None => None,
    };
    let qod = custom.remove("qod").and_then(|q| q.parse().ok());
    let creation_time = timestamp(oid, "creation_date", custom.remove("creation_date"));
    let modification_time = timestamp(oid, "last_modification", custom.remove("last_modification"));

    Ok(Some(VtRecord {
        oid: oid.to_owned(),
        name: field(KbNvtPos::Name).to_owned(),
        filename: field(KbNvtPos::Filename).to_owned(),
        family: field(KbNvtPos::Family).to_owned(),
        parameters: parameters(ctx, oid)?,
        references: references(
            field(KbNvtPos::Bids),
            field(KbNvtPos::Cves),
            field(KbNvtPos::Xrefs),
            oid,
        ),
        dependencies: dependencies(ctx, oid, field(KbNvtPos::Dependencies))?,
        qod_type,
        qod,
        severity,
        creation_time,
        modification_time,
        custom,
    }))
}

impl CatalogSource for RedisCatalogSource {
    fn version(&self) -> StoreResult<Option<FeedVersion>> {
        let Some(mut ctx) = self.open()? else {
            return Ok(None);
        };
        Ok(ctx
            .get(CACHE_KEY)?
            .as_deref()
            .and_then(parse_feed_version))
    }

    fn load(&self) -> StoreResult<VtCatalog> {
        let Some(mut ctx) = self.open()? else {
            return Ok(VtCatalog::default());
        };
        let version = ctx
            .get(CACHE_KEY)?
            .as_deref()
            .and_then(parse_feed_version)
            .unwrap_or_default();
        let mut vts = Vec::new();
        for key in ctx.keys("nvt:*")? {
            let oid = key.trim_start_matches("nvt:");
            if let Some(vt) = record(&mut ctx, oid)? {
                vts.push(vt);
            }
        }
        tracing::debug!(version, vts = vts.len(), "loaded VT catalog from redis");
        Ok(VtCatalog::new(version, vts))
    }
}
