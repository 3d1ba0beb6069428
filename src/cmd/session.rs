//! `attach`, `debug` and `debugserver` commands.

use anyhow::Result;

use super::{load_config, session_params};
use crate::{
    cli::RunnerCmd,
    host::SystemHost,
    probe::{
        boot::TargetBinary,
        plan::{self, SessionIntent},
        toolchain::{self, Platform},
        DebugSession,
    },
    utils::register_signals,
};

/// Runs a debug session for `intent`.
pub async fn run(cmd: RunnerCmd, intent: SessionIntent) -> Result<()> {
    let mut signals = register_signals()?;
    let config = load_config(&cmd)?;
    let params = session_params(&cmd, &config)?;
    let host = SystemHost;

    let toolchain = toolchain::locate(&host, Platform::current(), config.tools.root.as_deref())?;
    let binary = TargetBinary::read(&cmd.elf_file, &cmd.build_dir);
    let (mode, _) = binary.execution_mode();
    let plan = plan::plan(&host, mode, intent, &toolchain, &binary, &params)?;

    let session = DebugSession::new(plan);
    session.require(&host)?;
    session.run(&mut signals).await?.into_result()?;
    Ok(())
}
