// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Calls the openvas executable for different purposes, e.g. starting or
//! stopping a scan.

use configparser::ini::Ini;
use std::{
    io::{self, Result},
    process::{Child, Command, Stdio},
};

/// Check if it is possible to start openvas with the sudo command. In most
/// environments it is necessary to start openvas as sudo, as it is not possible
/// to use all functionalities.
pub fn check_sudo(executable: &str) -> bool {
    Command::new("sudo")
        .args(["-n", executable, "-s"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Read the openvas configuration.
pub fn read_openvas_config(executable: &str) -> Result<Ini> {
    let oconfig = Command::new(executable).arg("-s").output()?;

    let mut config = Ini::new();
    let oconfig = oconfig.stdout.iter().map(|x| *x as char).collect();
    config
        .read(oconfig)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(config)
}

/// Get the path to the redis unix socket from openvas configuration
pub fn get_redis_socket(config: &Ini) -> Option<String> {
    config
        .get("default", "db_address")
        .map(|setting| format!("unix://{setting}"))
}

/// Get the folder the feed is stored in from openvas configuration
pub fn plugins_folder(config: &Ini) -> Option<String> {
    config.get("default", "plugins_folder")
}

/// Builds the command, prefixed by `nice` and `sudo` when requested.
fn openvas(executable: &str, sudo: bool, nice: Option<i8>) -> Command {
    let mut prefix: Vec<String> = Vec::new();
    if let Some(niceness) = nice {
        prefix.extend(["nice".into(), "-n".into(), niceness.to_string()]);
    }
    if sudo {
        prefix.extend(["sudo".into(), "-n".into()]);
    }
    match prefix.split_first() {
        Some((program, args)) => {
            let mut cmd = Command::new(program);
            cmd.args(args).arg(executable);
            cmd
        }
        None => Command::new(executable),
    }
}

/// Start a new scan with the openvas executable with the given string. Before a scan can be
/// started all data needed for the scan must be put into redis before.
pub fn start(executable: &str, id: &str, sudo: bool, nice: Option<i8>) -> Result<Child> {
    openvas(executable, sudo, nice)
        .args(["--scan-start", id])
        .spawn()
}

/// Stops a running scan. Openvas internally sends an SIGUSR1 to the running
/// openvas scan.
pub fn stop(executable: &str, id: &str, sudo: bool) -> Result<Child> {
    openvas(executable, sudo, None)
        .args(["--scan-stop", id])
        .spawn()
}

/// Lets openvas load the feed into its redis cache.
pub fn update_vt_info(executable: &str, sudo: bool) -> Result<Child> {
    openvas(executable, sudo, None)
        .arg("--update-vt-info")
        .spawn()
}
