//! ST-LINK GDB server sessions.
//!
//! A session is the GDB server plus, for `attach` and `debug`, a GDB client
//! talking to it. Both children are spawned with `kill_on_drop`, so a
//! cancelled session never leaves either behind. The server runs in its own
//! process group with no stdin: Ctrl-C at the terminal reaches GDB only.

pub mod boot;
pub mod plan;
pub mod toolchain;

use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use anyhow::Result;
use tokio::process::{Child, Command};

use self::plan::{ClientCommand, CommandPlan, ServerCommand};
use crate::{
    error::RunnerError,
    host::Host,
    utils::{spawn_command, ExitStatusError, SignalStream, WithSignals},
};

/// How long the server gets to fail on start-up before the client is started.
pub const STARTUP_GRACE: Duration = Duration::from_millis(300);

/// Which process ended the session and how.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionExit {
    /// Executable that determined the outcome.
    pub program: PathBuf,
    /// Its exit status.
    pub status: ExitStatus,
}

impl SessionExit {
    /// Turns an unsuccessful exit into an error.
    pub fn into_result(self) -> Result<(), ExitStatusError> {
        ExitStatusError::check(&self.program, self.status)
    }
}

/// A planned debug session, ready to be started.
pub struct DebugSession {
    plan: CommandPlan,
    startup_grace: Duration,
}

impl DebugSession {
    /// Creates a session for `plan`.
    pub fn new(plan: CommandPlan) -> Self {
        Self { plan, startup_grace: STARTUP_GRACE }
    }

    /// Overrides [`STARTUP_GRACE`].
    pub fn startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// The plan this session runs.
    pub fn plan(&self) -> &CommandPlan {
        &self.plan
    }

    /// Checks that every executable the session needs can be run.
    pub fn require(&self, host: &dyn Host) -> Result<(), RunnerError> {
        require(host, &self.plan.server.program)?;
        if let Some(client) = &self.plan.client {
            require(host, &client.program)?;
        }
        Ok(())
    }

    /// Runs the session to completion.
    ///
    /// Without a client this waits for the server. With a client, the one
    /// that exits first decides the outcome and the other is killed. GDB
    /// itself waits for the server to listen: its connect directive turns on
    /// TCP auto-retry.
    pub async fn run(self, signals: &mut SignalStream) -> Result<SessionExit> {
        let server_program = self.plan.server.program.clone();
        let mut server = spawn_command(server_command(&self.plan.server))?;

        let client = match &self.plan.client {
            Some(client) => client,
            None => {
                let status = server.wait().with_signals(signals, false).await?;
                return Ok(SessionExit { program: server_program, status });
            }
        };

        if let Ok(status) = tokio::time::timeout(self.startup_grace, server.wait()).await {
            log::warn!("GDB server exited before the debugger was started");
            return Ok(SessionExit { program: server_program, status: status? });
        }

        let mut gdb = match spawn_command(client_command(client)) {
            Ok(gdb) => gdb,
            Err(err) => {
                terminate(&mut server, &server_program).await;
                return Err(err);
            }
        };
        let exit = wait_first(&mut server, &server_program, &mut gdb, &client.program)
            .with_signals(signals, true)
            .await;
        terminate(&mut gdb, &client.program).await;
        terminate(&mut server, &server_program).await;
        exit
    }
}

async fn wait_first(
    server: &mut Child,
    server_program: &Path,
    gdb: &mut Child,
    gdb_program: &Path,
) -> std::io::Result<SessionExit> {
    tokio::select! {
        status = gdb.wait() => {
            let status = status?;
            log::debug!("Debugger exited: {}", status);
            Ok(SessionExit { program: gdb_program.to_path_buf(), status })
        }
        status = server.wait() => {
            let status = status?;
            log::warn!("GDB server exited while the debugger was running: {}", status);
            Ok(SessionExit { program: server_program.to_path_buf(), status })
        }
    }
}

async fn terminate(child: &mut Child, program: &Path) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    log::debug!("Stopping {}", program.display());
    if let Err(err) = child.kill().await {
        log::warn!("Could not stop {}: {}", program.display(), err);
    }
}

fn require(host: &dyn Host, program: &Path) -> Result<(), RunnerError> {
    let found = if program.components().count() > 1 {
        host.is_executable(program)
    } else {
        program.to_str().and_then(|name| host.which(name)).is_some()
    };
    if found {
        Ok(())
    } else {
        Err(RunnerError::ToolMissing(program.to_path_buf()))
    }
}

fn server_command(server: &ServerCommand) -> Command {
    let mut command = Command::new(&server.program);
    command.args(&server.args);
    command.stdin(Stdio::null());
    detach_process_group(&mut command);
    command.kill_on_drop(true);
    command
}

#[cfg(unix)]
fn detach_process_group(command: &mut Command) {
    command.process_group(0);
}

#[cfg(windows)]
fn detach_process_group(command: &mut Command) {
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach_process_group(_command: &mut Command) {}

fn client_command(client: &ClientCommand) -> Command {
    let mut command = Command::new(&client.program);
    command.args(client.args());
    command.kill_on_drop(true);
    command
}
