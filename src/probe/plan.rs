//! Command planning for the ST-LINK GDB server and the GDB client.
//!
//! [`strategy`] is the single place deciding how each execution mode is
//! debugged for each command; [`plan`] turns the chosen strategy into
//! concrete command lines.

use super::{
    boot::{ExecutionMode, TargetBinary},
    toolchain::ToolInstallation,
};
use crate::{
    error::{Result, RunnerError},
    host::Host,
};
use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
};

/// Default GDB server port.
pub const DEFAULT_PORT: u16 = 61234;

/// Default number of seconds GDB retries connecting to the server.
pub const DEFAULT_CONNECT_TIMEOUT: u32 = 15;

/// MCUboot function that hands over to the application.
pub const HANDOFF_SYMBOL: &str = "boot_go";

/// Application entry symbol.
pub const APP_ENTRY_SYMBOL: &str = "main";

/// The requested command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionIntent {
    /// Attach to a running target without resetting it.
    Attach,
    /// Start a new debug session.
    DebugNew,
    /// Only run the GDB server.
    ServerOnly,
}

impl SessionIntent {
    /// All intents.
    pub const ALL: [Self; 3] = [Self::Attach, Self::DebugNew, Self::ServerOnly];

    /// Command-line name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Attach => "attach",
            Self::DebugNew => "debug",
            Self::ServerOnly => "debugserver",
        }
    }
}

/// Debug port wiring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interface {
    /// Serial Wire Debug.
    Swd,
    /// JTAG.
    Jtag,
}

/// Caller-supplied session settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionParams {
    /// Debug port wiring.
    pub interface: Interface,
    /// GDB server port.
    pub port: u16,
    /// Debug access port.
    pub apid: u32,
    /// ST-LINK serial number.
    pub serial: Option<String>,
    /// External loader file name, looked up in the programmer's
    /// `ExternalLoader` directory.
    pub external_loader: Option<String>,
    /// Run `Init()` from the external loader after reset.
    pub external_init: bool,
    /// Debugger client executable.
    pub gdb: Option<PathBuf>,
    /// Address the application symbols are attached at in chained boot.
    /// `None` uses the addresses recorded in the ELF.
    pub app_offset: Option<u32>,
    /// Seconds GDB keeps retrying the server connection.
    pub connect_timeout: u32,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            interface: Interface::Swd,
            port: DEFAULT_PORT,
            apid: 0,
            serial: None,
            external_loader: None,
            external_init: false,
            gdb: None,
            app_offset: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// How the GDB server treats the target on connect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerMode {
    /// `--attach`: leave the target running as it is.
    Attach,
    /// `--initialize-reset`: reset the target first.
    InitializeReset,
}

impl ServerMode {
    fn flag(self) -> &'static str {
        match self {
            Self::Attach => "--attach",
            Self::InitializeReset => "--initialize-reset",
        }
    }
}

/// What the debugger client does once started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientScript {
    /// No client.
    Absent,
    /// Connect and stop.
    ConnectOnly,
    /// Connect and load the firmware.
    Load,
    /// Load and run the bootloader up to the hand-off, then switch to the
    /// application symbols.
    ChainedBoot,
}

/// Entry of the strategy table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strategy {
    /// Server connect behaviour.
    pub server: ServerMode,
    /// Client behaviour.
    pub client: ClientScript,
}

/// Looks up the strategy for an execution mode and command.
pub fn strategy(mode: ExecutionMode, intent: SessionIntent) -> Strategy {
    use ExecutionMode::{FlashChained, Fsbl, Ram, Unknown};
    use SessionIntent::{Attach, DebugNew, ServerOnly};

    let (server, client) = match (intent, mode) {
        (Attach, Fsbl | Ram | FlashChained | Unknown) => (ServerMode::Attach, ClientScript::ConnectOnly),
        (DebugNew, FlashChained) => (ServerMode::Attach, ClientScript::ChainedBoot),
        (DebugNew, Fsbl | Ram | Unknown) => (ServerMode::InitializeReset, ClientScript::Load),
        // Nothing loads the bootloader ELF without a client, so it is not looked up.
        (ServerOnly, FlashChained) => (ServerMode::Attach, ClientScript::Absent),
        (ServerOnly, Fsbl | Ram | Unknown) => (ServerMode::InitializeReset, ClientScript::Absent),
    };
    Strategy { server, client }
}

/// A debugger client directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GdbCommand {
    /// Connect to the GDB server, retrying until it listens.
    Connect {
        /// Server port.
        port: u16,
        /// Seconds to keep retrying.
        timeout: u32,
    },
    /// Program the target; `None` loads the symbol file GDB was started with.
    Load(Option<PathBuf>),
    /// Set a breakpoint.
    Breakpoint {
        /// Symbol to break at.
        symbol: String,
        /// Use a hardware breakpoint.
        hardware: bool,
    },
    /// Resume the target.
    Continue,
    /// Add symbols without loading code.
    SymbolFile {
        /// ELF with the symbols.
        path: PathBuf,
        /// Text address; `None` keeps the ELF's addresses.
        offset: Option<u32>,
    },
}

impl GdbCommand {
    /// Short name of the directive.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Load(_) => "load",
            Self::Breakpoint { .. } => "breakpoint",
            Self::Continue => "continue",
            Self::SymbolFile { .. } => "symbol-file",
        }
    }

    /// GDB command lines for this directive.
    pub fn render(&self) -> Vec<String> {
        match self {
            Self::Connect { port, timeout } => vec![
                "set tcp auto-retry on".to_string(),
                format!("set tcp connect-timeout {}", timeout),
                format!("target remote :{}", port),
            ],
            Self::Load(None) => vec!["load".to_string()],
            Self::Load(Some(path)) => vec![format!("load {}", gdb_path(path))],
            Self::Breakpoint { symbol, hardware: true } => vec![format!("hbreak {}", symbol)],
            Self::Breakpoint { symbol, hardware: false } => vec![format!("break {}", symbol)],
            Self::Continue => vec!["continue".to_string()],
            Self::SymbolFile { path, offset } => {
                let add = match offset {
                    Some(offset) => format!("add-symbol-file {} {:#x}", gdb_path(path), offset),
                    None => format!("add-symbol-file {}", gdb_path(path)),
                };
                vec!["set confirm off".to_string(), add, "set confirm on".to_string()]
            }
        }
    }
}

impl fmt::Display for GdbCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render().join("; "))
    }
}

// GDB wants forward slashes even on Windows.
fn gdb_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// The GDB server command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerCommand {
    /// Executable.
    pub program: PathBuf,
    /// Arguments.
    pub args: Vec<OsString>,
}

/// The debugger client command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCommand {
    /// Executable.
    pub program: PathBuf,
    /// Directives, in order.
    pub commands: Vec<GdbCommand>,
    /// ELF GDB is started with.
    pub symbols: PathBuf,
}

impl ClientCommand {
    /// Arguments: one `-ex` per rendered command, then the symbol file.
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        for line in self.commands.iter().flat_map(GdbCommand::render) {
            args.push("-ex".into());
            args.push(line.into());
        }
        args.push(self.symbols.clone().into_os_string());
        args
    }
}

/// Everything needed to start a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPlan {
    /// The requested command.
    pub intent: SessionIntent,
    /// The execution mode the plan was made for.
    pub mode: ExecutionMode,
    /// GDB server.
    pub server: ServerCommand,
    /// Debugger client, absent for [`SessionIntent::ServerOnly`].
    pub client: Option<ClientCommand>,
}

impl CommandPlan {
    /// Kinds of the client directives, empty without a client.
    pub fn command_kinds(&self) -> Vec<&'static str> {
        self.client
            .iter()
            .flat_map(|client| client.commands.iter().map(GdbCommand::kind))
            .collect()
    }
}

/// Builds the command plan for `binary`.
pub fn plan(
    host: &dyn Host,
    mode: ExecutionMode,
    intent: SessionIntent,
    toolchain: &ToolInstallation,
    binary: &TargetBinary,
    params: &SessionParams,
) -> Result<CommandPlan> {
    let strategy = strategy(mode, intent);
    log::debug!("{} in {} mode: {:?}", intent.name(), mode, strategy);

    let server = server_command(host, toolchain, strategy.server, params)?;
    let client = match strategy.client {
        ClientScript::Absent => None,
        script => {
            let gdb = params.gdb.clone().ok_or(RunnerError::DebuggerNotConfigured)?;
            Some(client_command(host, gdb, script, binary, params)?)
        }
    };
    Ok(CommandPlan { intent, mode, server, client })
}

fn server_command(
    host: &dyn Host,
    toolchain: &ToolInstallation,
    mode: ServerMode,
    params: &SessionParams,
) -> Result<ServerCommand> {
    let mut args: Vec<OsString> = Vec::new();
    args.push("--stm32cubeprogrammer-path".into());
    args.push(toolchain.programmer_dir.clone().into_os_string());
    args.push("--port-number".into());
    args.push(params.port.to_string().into());
    args.push("--apid".into());
    args.push(params.apid.to_string().into());
    args.push("--halt".into());
    if params.interface == Interface::Swd {
        args.push("--swd".into());
    }
    args.push(mode.flag().into());
    if let Some(serial) = &params.serial {
        args.push("--serial-number".into());
        args.push(serial.into());
    }
    if let Some(loader) = &params.external_loader {
        let path = toolchain.programmer_dir.join("ExternalLoader").join(loader);
        if !host.is_file(&path) {
            return Err(RunnerError::ExternalLoaderNotFound(path));
        }
        if params.external_init {
            args.push("--external-init".into());
        }
        args.push("--extload".into());
        args.push(path.into_os_string());
    }
    Ok(ServerCommand { program: toolchain.server.clone(), args })
}

fn client_command(
    host: &dyn Host,
    program: PathBuf,
    script: ClientScript,
    binary: &TargetBinary,
    params: &SessionParams,
) -> Result<ClientCommand> {
    let connect = GdbCommand::Connect { port: params.port, timeout: params.connect_timeout };
    let (commands, symbols) = match script {
        ClientScript::Absent | ClientScript::ConnectOnly => (vec![connect], binary.path.clone()),
        ClientScript::Load => {
            (vec![connect, GdbCommand::Load(Some(binary.path.clone()))], binary.path.clone())
        }
        ClientScript::ChainedBoot => {
            let bootloader = find_bootloader(host, &binary.build_dir)?;
            let commands = vec![
                connect,
                GdbCommand::Load(None),
                GdbCommand::Breakpoint { symbol: HANDOFF_SYMBOL.into(), hardware: true },
                GdbCommand::Continue,
                GdbCommand::SymbolFile { path: binary.path.clone(), offset: params.app_offset },
                GdbCommand::Breakpoint { symbol: APP_ENTRY_SYMBOL.into(), hardware: false },
                GdbCommand::Continue,
            ];
            (commands, bootloader)
        }
    };
    Ok(ClientCommand { program, commands, symbols })
}

/// Locates the MCUboot ELF produced by a sysbuild build.
pub fn find_bootloader(host: &dyn Host, build_dir: &Path) -> Result<PathBuf> {
    let relative = Path::new("mcuboot").join("zephyr").join("zephyr.elf");
    let mut searched = vec![build_dir.join(&relative)];
    if let Some(parent) = build_dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        searched.push(parent.join(&relative));
    }
    if let Some(path) = searched.iter().find(|path| host.is_file(path)).cloned() {
        return Ok(path);
    }
    Err(RunnerError::BootloaderArtifactNotFound { searched })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{host::stub::MemoryHost, probe::boot::classify};

    const PRG: &str = "/opt/st/stm32cubeclt_1.18.0/STM32CubeProgrammer/bin";

    fn toolchain() -> ToolInstallation {
        ToolInstallation {
            version: None,
            server: "/opt/st/stm32cubeclt_1.18.0/STLink-gdb-server/bin/ST-LINK_gdbserver".into(),
            programmer_dir: PRG.into(),
        }
    }

    fn binary(entry_point: u32) -> TargetBinary {
        TargetBinary {
            path: "/work/build/app/zephyr/zephyr.elf".into(),
            build_dir: "/work/build/app".into(),
            entry_point,
        }
    }

    fn params() -> SessionParams {
        SessionParams { gdb: Some("arm-none-eabi-gdb".into()), ..SessionParams::default() }
    }

    fn host() -> MemoryHost {
        MemoryHost::default().file("/work/build/app/mcuboot/zephyr/zephyr.elf")
    }

    fn args(plan: &CommandPlan) -> Vec<String> {
        plan.server.args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn server_only_never_has_a_client() {
        let host = MemoryHost::default();
        for mode in ExecutionMode::ALL {
            let plan = plan(&host, mode, SessionIntent::ServerOnly, &toolchain(), &binary(0), &params())
                .unwrap();
            assert!(plan.client.is_none(), "{}", mode);
            assert!(plan.command_kinds().is_empty());
        }
    }

    #[test]
    fn server_only_needs_no_gdb() {
        let params = SessionParams::default();
        let plan = plan(
            &host(),
            ExecutionMode::Ram,
            SessionIntent::ServerOnly,
            &toolchain(),
            &binary(0x3400_0000),
            &params,
        )
        .unwrap();
        assert!(plan.client.is_none());
    }

    #[test]
    fn strategy_table() {
        for mode in ExecutionMode::ALL {
            for intent in SessionIntent::ALL {
                let strategy = strategy(mode, intent);
                match intent {
                    SessionIntent::Attach => {
                        assert_eq!(strategy.server, ServerMode::Attach);
                        assert_eq!(strategy.client, ClientScript::ConnectOnly);
                    }
                    SessionIntent::ServerOnly => assert_eq!(strategy.client, ClientScript::Absent),
                    SessionIntent::DebugNew if mode == ExecutionMode::FlashChained => {
                        assert_eq!(strategy.server, ServerMode::Attach);
                        assert_eq!(strategy.client, ClientScript::ChainedBoot);
                    }
                    SessionIntent::DebugNew => {
                        assert_eq!(strategy.server, ServerMode::InitializeReset);
                        assert_eq!(strategy.client, ClientScript::Load);
                    }
                }
            }
        }
    }

    #[test]
    fn full_server_command_line() {
        let params = SessionParams {
            port: 4242,
            apid: 1,
            serial: Some("003A00".into()),
            ..params()
        };
        let plan = plan(
            &host(),
            ExecutionMode::Unknown,
            SessionIntent::DebugNew,
            &toolchain(),
            &binary(0x0800_0000),
            &params,
        )
        .unwrap();
        assert_eq!(plan.server.program, toolchain().server);
        assert_eq!(
            args(&plan),
            [
                "--stm32cubeprogrammer-path",
                PRG,
                "--port-number",
                "4242",
                "--apid",
                "1",
                "--halt",
                "--swd",
                "--initialize-reset",
                "--serial-number",
                "003A00",
            ]
        );
    }

    #[test]
    fn jtag_omits_swd() {
        let params = SessionParams { interface: Interface::Jtag, ..params() };
        let plan =
            plan(&host(), ExecutionMode::Ram, SessionIntent::Attach, &toolchain(), &binary(0), &params)
                .unwrap();
        assert!(!args(&plan).iter().any(|a| a == "--swd"));
    }

    #[test]
    fn chained_debug_attaches_without_reset() {
        let plan = plan(
            &host(),
            ExecutionMode::FlashChained,
            SessionIntent::DebugNew,
            &toolchain(),
            &binary(0x0804_0000),
            &params(),
        )
        .unwrap();
        let args = args(&plan);
        assert!(args.iter().any(|a| a == "--attach"));
        assert!(!args.iter().any(|a| a == "--initialize-reset"));
        assert_eq!(
            plan.command_kinds(),
            ["connect", "load", "breakpoint", "continue", "symbol-file", "breakpoint", "continue"]
        );
        let client = plan.client.unwrap();
        assert_eq!(client.symbols, Path::new("/work/build/app/mcuboot/zephyr/zephyr.elf"));
        assert_eq!(client.commands[1], GdbCommand::Load(None));
        assert_eq!(
            client.commands[4],
            GdbCommand::SymbolFile { path: "/work/build/app/zephyr/zephyr.elf".into(), offset: None }
        );
    }

    #[test]
    fn chained_symbol_offset() {
        let params = SessionParams { app_offset: Some(0x0804_0000), ..params() };
        let plan = plan(
            &host(),
            ExecutionMode::FlashChained,
            SessionIntent::DebugNew,
            &toolchain(),
            &binary(0x0804_0000),
            &params,
        )
        .unwrap();
        let rendered = plan.client.unwrap().commands[4].render();
        assert_eq!(
            rendered,
            [
                "set confirm off",
                "add-symbol-file /work/build/app/zephyr/zephyr.elf 0x8040000",
                "set confirm on",
            ]
        );
    }

    #[test]
    fn chained_without_bootloader() {
        let err = plan(
            &MemoryHost::default(),
            ExecutionMode::FlashChained,
            SessionIntent::DebugNew,
            &toolchain(),
            &binary(0x0804_0000),
            &params(),
        )
        .unwrap_err();
        match err {
            RunnerError::BootloaderArtifactNotFound { searched } => assert_eq!(searched.len(), 2),
            err => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn bootloader_next_to_build_dir() {
        let host = MemoryHost::default().file("/work/build/mcuboot/zephyr/zephyr.elf");
        let found = find_bootloader(&host, Path::new("/work/build/app")).unwrap();
        assert_eq!(found, Path::new("/work/build/mcuboot/zephyr/zephyr.elf"));
    }

    #[test]
    fn missing_external_loader() {
        let params = SessionParams { external_loader: Some("MX66UW1G45G.stldr".into()), ..params() };
        let err = plan(
            &host(),
            ExecutionMode::Unknown,
            SessionIntent::ServerOnly,
            &toolchain(),
            &binary(0),
            &params,
        )
        .unwrap_err();
        match err {
            RunnerError::ExternalLoaderNotFound(path) => {
                assert_eq!(path, Path::new(PRG).join("ExternalLoader").join("MX66UW1G45G.stldr"));
            }
            err => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn external_loader_flags() {
        let loader = Path::new(PRG).join("ExternalLoader").join("MX66UW1G45G.stldr");
        let host = host().file(loader.clone());
        let params = SessionParams {
            external_loader: Some("MX66UW1G45G.stldr".into()),
            external_init: true,
            ..params()
        };
        let plan = plan(&host, ExecutionMode::Unknown, SessionIntent::DebugNew, &toolchain(), &binary(0), &params)
            .unwrap();
        let args = args(&plan);
        assert_eq!(args[args.len() - 3..], ["--external-init", "--extload", &*loader.to_string_lossy()]);
    }

    #[test]
    fn debug_requires_gdb() {
        let params = SessionParams::default();
        for intent in [SessionIntent::Attach, SessionIntent::DebugNew] {
            let err = plan(&host(), ExecutionMode::Ram, intent, &toolchain(), &binary(0), &params)
                .unwrap_err();
            assert!(matches!(err, RunnerError::DebuggerNotConfigured));
        }
    }

    #[test]
    fn fsbl_attach_connects_only() {
        let binary = binary(0x3418_5000);
        let mode = classify(binary.entry_point, "STM32N6");
        assert_eq!(mode, ExecutionMode::Fsbl);
        let plan = plan(&host(), mode, SessionIntent::Attach, &toolchain(), &binary, &params()).unwrap();
        assert!(args(&plan).iter().any(|a| a == "--attach"));
        assert_eq!(plan.command_kinds(), ["connect"]);
        let client = plan.client.unwrap();
        assert_eq!(client.symbols, binary.path);
    }

    #[test]
    fn fsbl_debug_loads() {
        let binary = binary(0x3418_0749);
        let plan = plan(&host(), ExecutionMode::Fsbl, SessionIntent::DebugNew, &toolchain(), &binary, &params())
            .unwrap();
        assert!(args(&plan).iter().any(|a| a == "--initialize-reset"));
        assert_eq!(plan.command_kinds(), ["connect", "load"]);
    }

    #[test]
    fn client_arguments() {
        let plan = plan(&host(), ExecutionMode::Ram, SessionIntent::DebugNew, &toolchain(), &binary(0), &params())
            .unwrap();
        let client = plan.client.unwrap();
        let args: Vec<_> = client.args().iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "-ex",
                "set tcp auto-retry on",
                "-ex",
                "set tcp connect-timeout 15",
                "-ex",
                "target remote :61234",
                "-ex",
                "load /work/build/app/zephyr/zephyr.elf",
                "/work/build/app/zephyr/zephyr.elf",
            ]
        );
    }
}
