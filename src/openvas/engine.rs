// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{io, process::Child};

use super::cmd;

/// A spawned engine process.
pub trait EngineProcess: Send + 'static {
    /// Process id, if the process has one.
    fn id(&self) -> Option<u32>;

    /// Exit code once the process ended, without waiting for it.
    ///
    /// A process killed by a signal reports the negated signal number.
    fn try_exit(&mut self) -> io::Result<Option<i32>>;
}

/// The external scan engine.
pub trait Engine: Send + Sync + 'static {
    type Process: EngineProcess;

    /// Starts the scan whose preferences are stored under `engine_id`.
    fn start(&self, engine_id: &str) -> io::Result<Self::Process>;

    /// Tells the engine to stop the scan and blocks until the instruction was delivered.
    fn stop(&self, engine_id: &str) -> io::Result<()>;

    /// Lets the engine load the feed from disk into its VT cache.
    fn refresh_vt_cache(&self) -> io::Result<()>;
}

/// The openvas executable.
#[derive(Debug, Clone)]
pub struct OpenvasEngine {
    executable: String,
    sudo: bool,
    niceness: Option<i8>,
}

impl OpenvasEngine {
    pub fn new(executable: impl Into<String>, sudo: bool, niceness: Option<i8>) -> Self {
        Self {
            executable: executable.into(),
            sudo,
            niceness,
        }
    }
}

impl Default for OpenvasEngine {
    fn default() -> Self {
        Self {
            executable: "openvas".to_owned(),
            sudo: cmd::check_sudo("openvas"),
            niceness: None,
        }
    }
}

#[derive(Debug)]
pub struct OpenvasProcess(Child);

impl From<Child> for OpenvasProcess {
    fn from(child: Child) -> Self {
        Self(child)
    }
}

#[cfg(unix)]
fn signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal(_: &std::process::ExitStatus) -> Option<i32> {
    None
}

impl EngineProcess for OpenvasProcess {
    fn id(&self) -> Option<u32> {
        Some(self.0.id())
    }

    fn try_exit(&mut self) -> io::Result<Option<i32>> {
        Ok(self.0.try_wait()?.map(|status| {
            status
                .code()
                .or_else(|| signal(&status).map(|s| -s))
                .unwrap_or(-1)
        }))
    }
}

impl Engine for OpenvasEngine {
    type Process = OpenvasProcess;

    fn start(&self, engine_id: &str) -> io::Result<OpenvasProcess> {
        tracing::debug!(
            engine_id,
            sudo = self.sudo,
            niceness = ?self.niceness,
            "starting openvas"
        );
        cmd::start(&self.executable, engine_id, self.sudo, self.niceness).map(OpenvasProcess::from)
    }

    fn stop(&self, engine_id: &str) -> io::Result<()> {
        cmd::stop(&self.executable, engine_id, self.sudo)?.wait()?;
        Ok(())
    }

    fn refresh_vt_cache(&self) -> io::Result<()> {
        let status = cmd::update_vt_info(&self.executable, self.sudo)?.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "openvas --update-vt-info failed: {status}"
            )))
        }
    }
}
