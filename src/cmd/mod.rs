//! Command handlers.

pub mod inspect;
pub mod session;

use anyhow::{Context, Result};
use stlink_config::Config;

use crate::{
    cli::{parse_address, RunnerCmd},
    probe::plan::{Interface, SessionParams, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT},
};

/// Loads the configuration file named on the command line, or the one in
/// the current directory if there is one.
pub fn load_config(cmd: &RunnerCmd) -> Result<Config> {
    let config = match &cmd.config {
        Some(path) => Config::read_from_file(path)?,
        None => Config::read_from_current_dir()?,
    };
    Ok(config)
}

/// Merges command line options over the configuration file over defaults.
pub fn session_params(cmd: &RunnerCmd, config: &Config) -> Result<SessionParams> {
    let probe = &config.probe;
    let swd = !cmd.no_swd && probe.swd.unwrap_or(true);
    let app_offset = match (cmd.app_offset, &config.boot.app_offset) {
        (Some(offset), _) => Some(offset),
        (None, Some(offset)) => Some(
            parse_address(offset).with_context(|| format!("invalid `boot.app-offset` {:?}", offset))?,
        ),
        (None, None) => None,
    };
    Ok(SessionParams {
        interface: if swd { Interface::Swd } else { Interface::Jtag },
        port: cmd.port_number.or(probe.port).unwrap_or(DEFAULT_PORT),
        apid: cmd.apid.or(probe.apid).unwrap_or(0),
        serial: cmd.dev_id.clone().or_else(|| probe.serial.clone()),
        external_loader: cmd.extload.clone().or_else(|| probe.extload.clone()),
        external_init: cmd.external_init || probe.external_init.unwrap_or(false),
        gdb: cmd.gdb.clone().or_else(|| probe.gdb.clone()),
        app_offset,
        connect_timeout: cmd
            .connect_timeout
            .or(config.boot.connect_timeout)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
    })
}
