// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Configuration read from a TOML file.
//!
//! Every table is optional. Values that are not set are taken from the
//! configuration of openvas itself (`openvas -s`) when they are needed.

pub mod duration;
mod logging;

use std::{
    fmt::{self, Display, Formatter},
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use logging::{Logging, SerLevel};

use crate::openvas::{Intervals, OpenvasEngine, cmd};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/openvas-orchestrator/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read {0}: {1}")]
    Read(PathBuf, #[source] io::Error),
    #[error("Invalid configuration in {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Unable to read the openvas configuration: {0}")]
    Openvas(#[source] io::Error),
    #[error("{0} is neither configured nor known by openvas")]
    Missing(&'static str),
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Redis {
    /// e.g. `unix:///run/redis-openvas/redis.sock`
    pub url: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Engine {
    pub executable: String,
    /// Run openvas through `sudo -n`. Detected when not set.
    pub sudo: Option<bool>,
    pub niceness: Option<i8>,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            executable: "openvas".to_owned(),
            sudo: None,
            niceness: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Scheduler {
    #[serde(with = "duration")]
    pub check_interval: Duration,
    #[serde(with = "duration")]
    pub launch_check_interval: Duration,
    #[serde(with = "duration")]
    pub feed_check_interval: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        let intervals = Intervals::default();
        Self {
            check_interval: intervals.check,
            launch_check_interval: intervals.launch_check,
            feed_check_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Feed {
    pub plugins_folder: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub redis: Redis,
    pub engine: Engine,
    pub scheduler: Scheduler,
    pub feed: Feed,
    pub log: Logging,
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", toml::to_string_pretty(self).unwrap_or_default())
    }
}

impl Config {
    pub fn from_toml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(path.to_owned(), e))
    }

    /// Reads the given file. Without a path the default location is tried and
    /// a missing file results in the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::from_toml(path, &content)
            }
            Err(e) if !required && e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Read(path.to_owned(), e)),
        }
    }

    pub fn intervals(&self) -> Intervals {
        Intervals {
            check: self.scheduler.check_interval,
            launch_check: self.scheduler.launch_check_interval,
        }
    }

    pub fn engine(&self) -> OpenvasEngine {
        let sudo = self
            .engine
            .sudo
            .unwrap_or_else(|| cmd::check_sudo(&self.engine.executable));
        OpenvasEngine::new(&self.engine.executable, sudo, self.engine.niceness)
    }

    /// Fills values that are not configured from the configuration of openvas.
    pub fn resolve(mut self) -> Result<Self, ConfigError> {
        if self.redis.url.is_some() && self.feed.plugins_folder.is_some() {
            return Ok(self);
        }
        let openvas =
            cmd::read_openvas_config(&self.engine.executable).map_err(ConfigError::Openvas)?;
        if self.redis.url.is_none() {
            self.redis.url =
                Some(cmd::get_redis_socket(&openvas).ok_or(ConfigError::Missing("db_address"))?);
        }
        if self.feed.plugins_folder.is_none() {
            self.feed.plugins_folder = Some(
                cmd::plugins_folder(&openvas)
                    .ok_or(ConfigError::Missing("plugins_folder"))?
                    .into(),
            );
        }
        Ok(self)
    }
}
