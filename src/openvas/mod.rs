// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Drives openvas through the keyed store.
//!
//! A scan is compiled into preference lines, written into a freshly allocated
//! main index and handed to openvas by its engine id. While openvas runs, the
//! results it writes into the main index and into the per host indices are
//! translated and passed on to a [Reporter].

pub mod cmd;
mod engine;
mod error;
#[allow(clippy::module_inception)]
mod openvas;
pub mod pref_handler;
pub mod result_collector;
pub mod running_scan;

pub use engine::{Engine, EngineProcess, OpenvasEngine, OpenvasProcess};
pub use error::{ConfigRejection, OpenvasError};
pub use openvas::Scanner;
pub use pref_handler::{CompiledPreferences, DroppedParameter, PreferenceHandler};
pub use result_collector::{Reporter, ResultCollector, Results};
pub use running_scan::{Intervals, RunningScan, RunningScanHandle};
