// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! CVSS v2 base score calculation.

use std::collections::HashMap;

/// The only severity scheme results get a numeric score for.
pub const CVSS_BASE_V2: &str = "cvss_base_v2";

fn access_vector(v: &str) -> Option<f64> {
    match v {
        "L" => Some(0.395),
        "A" => Some(0.646),
        "N" => Some(1.0),
        _ => None,
    }
}

fn access_complexity(v: &str) -> Option<f64> {
    match v {
        "H" => Some(0.35),
        "M" => Some(0.61),
        "L" => Some(0.71),
        _ => None,
    }
}

fn authentication(v: &str) -> Option<f64> {
    match v {
        "M" => Some(0.45),
        "S" => Some(0.56),
        "N" => Some(0.704),
        _ => None,
    }
}

fn impact(v: &str) -> Option<f64> {
    match v {
        "N" => Some(0.0),
        "P" => Some(0.275),
        "C" => Some(0.660),
        _ => None,
    }
}

fn round_to_1_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Calculates the base score of a vector like `AV:N/AC:L/Au:N/C:P/I:P/A:P`.
///
/// Returns `None` when a base metric is missing or carries an unknown value.
pub fn cvss_base_v2(vector: &str) -> Option<f32> {
    let vector = vector.trim().trim_start_matches('(').trim_end_matches(')');
    let metrics: HashMap<&str, &str> = vector
        .split('/')
        .filter_map(|m| m.split_once(':'))
        .collect();

    let av = access_vector(metrics.get("AV")?)?;
    let ac = access_complexity(metrics.get("AC")?)?;
    let au = authentication(metrics.get("Au")?)?;
    let c = impact(metrics.get("C")?)?;
    let i = impact(metrics.get("I")?)?;
    let a = impact(metrics.get("A")?)?;

    let impact = 10.41 * (1.0 - (1.0 - c) * (1.0 - i) * (1.0 - a));
    let exploitability = 20.0 * av * ac * au;
    let f_impact = if impact == 0.0 { 0.0 } else { 1.176 };
    let base = ((0.6 * impact) + (0.4 * exploitability) - 1.5) * f_impact;
    Some(round_to_1_decimal(base) as f32)
}
