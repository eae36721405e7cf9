// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Scan configuration as clients send it and the events they get back.

mod credential;
mod result;
mod scan;
pub mod scanner;
mod scanner_preference;
mod status;
mod target;

pub use credential::*;
pub use result::*;
pub use scan::*;
pub use scanner_preference::*;
pub use status::*;
pub use target::*;
