// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{collections::HashMap, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{Level, metadata::ParseLevelError};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// A tracing level that can be read from and written to a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SerLevel(Level);

impl Default for SerLevel {
    fn default() -> Self {
        Self(Level::INFO)
    }
}

impl FromStr for SerLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::from_str(s).map(SerLevel)
    }
}

impl From<Level> for SerLevel {
    fn from(level: Level) -> Self {
        SerLevel(level)
    }
}

impl From<SerLevel> for Level {
    fn from(level: SerLevel) -> Self {
        level.0
    }
}

impl Serialize for SerLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for SerLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Level::from_str(&s)
            .map(SerLevel)
            .map_err(serde::de::Error::custom)
    }
}

/// The `[log]` table.
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Logging {
    pub level: SerLevel,
    /// Levels per target, e.g. `openvas_orchestrator::feed = "trace"`.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub additional: HashMap<String, SerLevel>,
}

impl Logging {
    /// The default level raised by `verbose` steps.
    pub fn effective_level(&self, verbose: u8) -> Level {
        const ORDER: [Level; 5] = [
            Level::ERROR,
            Level::WARN,
            Level::INFO,
            Level::DEBUG,
            Level::TRACE,
        ];
        let level = Level::from(self.level);
        let start = ORDER.iter().position(|l| *l == level).unwrap_or(2);
        ORDER[(start + verbose as usize).min(ORDER.len() - 1)]
    }

    pub fn filter(&self, verbose: u8) -> filter::Targets {
        self.additional.iter().fold(
            filter::Targets::new().with_default(self.effective_level(verbose)),
            |filter, (target, level)| filter.with_target(target, Level::from(*level)),
        )
    }

    /// Installs the global subscriber.
    pub fn init(&self, verbose: u8) {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(self.filter(verbose))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        let logging = Logging::default();
        assert_eq!(logging.effective_level(0), Level::INFO);
        assert_eq!(logging.effective_level(1), Level::DEBUG);
        assert_eq!(logging.effective_level(5), Level::TRACE);
        let logging = Logging {
            level: Level::WARN.into(),
            ..Default::default()
        };
        assert_eq!(logging.effective_level(1), Level::INFO);
    }
}
