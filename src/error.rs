//! Errors raised while planning a debug session.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Session planning and start-up errors. Every variant aborts the session
/// before any process is spawned.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// No toolchain installation could be discovered.
    #[error("{program} not found: not on PATH and no `{pattern}` installation under `{}`", .root.display())]
    ToolNotFound {
        /// Program that was searched for.
        program: &'static str,
        /// Directory scanned for versioned installations.
        root: PathBuf,
        /// Installation directory name pattern.
        pattern: &'static str,
    },
    /// A specific executable is missing or not runnable.
    #[error("required program `{}` not found or not executable", .0.display())]
    ToolMissing(PathBuf),
    /// The requested external loader file does not exist.
    #[error("external loader `{}` does not exist", .0.display())]
    ExternalLoaderNotFound(PathBuf),
    /// The chained-boot flow needs the bootloader image, which was not built.
    #[error(
        "bootloader ELF not found (looked in {}); rebuild with sysbuild and MCUboot enabled",
        .searched.iter().map(|p| format!("`{}`", p.display())).collect::<Vec<_>>().join(", ")
    )]
    BootloaderArtifactNotFound {
        /// Locations that were checked.
        searched: Vec<PathBuf>,
    },
    /// `attach` and `debug` need a debugger client.
    #[error("a GDB executable is required for attach/debug (use `--gdb`)")]
    DebuggerNotConfigured,
    /// The host platform has no known toolchain layout.
    #[error("unsupported host platform `{0}`")]
    UnsupportedPlatform(&'static str),
    /// I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias for [`RunnerError`].
pub type Result<T> = std::result::Result<T, RunnerError>;
