//! `inspect` command.

use anyhow::Result;
use prettytable::{format, Cell, Row, Table};

use super::{load_config, session_params};
use crate::{
    cli::InspectCmd,
    color::Color,
    host::SystemHost,
    probe::{
        boot::TargetBinary,
        plan,
        toolchain::{self, Platform, ToolInstallation, GDB_SERVER},
    },
    utils::command_line,
};

/// Prints what a session would do.
pub fn run(cmd: InspectCmd, color: Color) -> Result<()> {
    let InspectCmd { intent, allow_missing_tools, runner } = cmd;
    let config = load_config(&runner)?;
    let params = session_params(&runner, &config)?;
    let host = SystemHost;

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    let mut row = |key: &str, value: String| {
        table.add_row(Row::new(vec![Cell::new(key), Cell::new(&value)]));
    };

    let toolchain = match toolchain::locate(&host, Platform::current(), config.tools.root.as_deref()) {
        Ok(toolchain) => {
            let version = toolchain.version.map_or_else(|| "from PATH".to_string(), |v| v.to_string());
            row("STM32CubeCLT", version);
            toolchain
        }
        Err(err) if allow_missing_tools => {
            row("STM32CubeCLT", color.bold_fg(&err.to_string(), ansi_term::Color::Yellow));
            ToolInstallation { version: None, server: GDB_SERVER.into(), programmer_dir: Default::default() }
        }
        Err(err) => return Err(err.into()),
    };
    row("Programmer", toolchain.programmer_dir.display().to_string());

    let binary = TargetBinary::read(&runner.elf_file, &runner.build_dir);
    let (mode, soc_family) = binary.execution_mode();
    row("SoC family", soc_family);
    row("Entry point", format!("{:#010x}", binary.entry_point));
    row("Mode", mode.to_string());
    row("Command", intent.name().to_string());

    let plan = plan::plan(&host, mode, intent, &toolchain, &binary, &params)?;
    row("Server", command_line(&plan.server.program, &plan.server.args));
    if let Some(client) = &plan.client {
        row("Client", command_line(&client.program, &client.args()));
        for (i, command) in client.commands.iter().enumerate() {
            row(&format!("  {}. {}", i + 1, command.kind()), command.to_string());
        }
    }
    table.printstd();
    Ok(())
}
