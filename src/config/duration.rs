// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! (De)serializes durations as `"500ms"`, `"3s"`, `"10m"` or `"1h"`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

const UNITS: &[(&str, u64)] = &[
    ("ms", 1),
    ("s", 1_000),
    ("m", 60_000),
    ("h", 3_600_000),
];

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(serde::de::Error::custom)
}

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(duration))
}

/// Parses a duration. A number without unit is taken as seconds.
pub fn parse(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (value, unit) = s.split_at(split);
    let value: u64 = value
        .parse()
        .map_err(|_| format!("Invalid number in duration: {s}"))?;
    let unit = if unit.is_empty() { "s" } else { unit };
    UNITS
        .iter()
        .find(|(u, _)| *u == unit)
        .map(|(_, factor)| Duration::from_millis(value * factor))
        .ok_or_else(|| {
            let supported = UNITS.iter().map(|(u, _)| *u).collect::<Vec<_>>().join(", ");
            format!("Unknown duration unit '{unit}', supported are {supported}")
        })
}

fn format(duration: &Duration) -> String {
    let ms = duration.as_millis();
    if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{ms}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units() {
        assert_eq!(parse("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse(" 3 "), Ok(Duration::from_secs(3)));
        assert_eq!(parse("10m"), Ok(Duration::from_secs(600)));
        assert_eq!(parse("1h"), Ok(Duration::from_secs(3600)));
        assert!(parse("1d").is_err());
        assert!(parse("s").is_err());
    }

    #[test]
    fn formatting() {
        assert_eq!(format(&Duration::from_secs(3)), "3s");
        assert_eq!(format(&Duration::from_millis(1500)), "1500ms");
    }
}
