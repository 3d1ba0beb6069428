//! STM32CubeCLT discovery.
//!
//! The GDB server and the programmer are taken from the executable search
//! path when both are there. Otherwise the platform's tools directory is
//! scanned for versioned `stm32cubeclt_X.Y.Z` installations and the most
//! recent one wins.

use crate::{
    error::{Result, RunnerError},
    host::Host,
};
use regex::Regex;
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// ST-LINK GDB server executable name.
pub const GDB_SERVER: &str = "ST-LINK_gdbserver";

/// STM32CubeProgrammer command-line executable name.
pub const PROGRAMMER_CLI: &str = "STM32_Programmer_CLI";

/// Installation directory name pattern.
pub const INSTALL_PATTERN: &str = r"(?i)^stm32cubeclt_([1-9])\.(\d+)\.(\d+)";

/// Host operating system, as far as toolchain layout is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// Linux.
    Linux,
    /// Windows.
    Windows,
    /// macOS.
    MacOs,
    /// Anything else, by `std::env::consts::OS` name.
    Other(&'static str),
}

impl Platform {
    /// Returns the platform this binary was built for.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            other => Self::Other(other),
        }
    }

    /// Default directory holding STM32CubeCLT installations.
    pub fn tools_root(self) -> Result<PathBuf> {
        match self {
            Self::Linux => Ok(PathBuf::from("/opt/st/")),
            Self::Windows => Ok(PathBuf::from("C:\\ST\\")),
            Self::MacOs => Ok(PathBuf::from("/opt/ST/")),
            Self::Other(name) => Err(RunnerError::UnsupportedPlatform(name)),
        }
    }

    fn exe_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            _ => "",
        }
    }

    fn probes_search_path(self) -> bool {
        matches!(self, Self::Linux | Self::Windows)
    }
}

/// STM32CubeCLT release number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major.
    pub major: u32,
    /// Minor.
    pub minor: u32,
    /// Patch.
    pub patch: u32,
}

impl Version {
    /// Creates a version.
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Single number used to rank installations.
    pub fn linear(self) -> u64 {
        u64::from(self.major) * 1_000_000 + u64::from(self.minor) * 1_000 + u64::from(self.patch)
    }

    fn from_install_name(pattern: &Regex, name: &str) -> Option<Self> {
        let captures = pattern.captures(name)?;
        let number = |i: usize| -> Option<u32> { captures.get(i)?.as_str().parse().ok() };
        Some(Self::new(number(1)?, number(2)?, number(3)?))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The toolchain selected for a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolInstallation {
    /// Release of the installation, `None` when found on the search path.
    pub version: Option<Version>,
    /// GDB server executable.
    pub server: PathBuf,
    /// Directory containing the programmer CLI.
    pub programmer_dir: PathBuf,
}

/// A versioned installation directory found by a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Parsed version.
    pub version: Version,
    /// Installation root.
    pub path: PathBuf,
}

/// Finds the toolchain to use. `root` replaces the platform's default scan
/// directory.
pub fn locate(host: &dyn Host, platform: Platform, root: Option<&Path>) -> Result<ToolInstallation> {
    if platform.probes_search_path() {
        if let (Some(server), Some(programmer)) = (host.which(GDB_SERVER), host.which(PROGRAMMER_CLI)) {
            let programmer_dir = programmer.parent().map(Path::to_path_buf).unwrap_or_default();
            log::info!("Using {} from PATH: {}", GDB_SERVER, server.display());
            return Ok(ToolInstallation { version: None, server, programmer_dir });
        }
    }

    let root = match root {
        Some(root) => root.to_path_buf(),
        None => platform.tools_root()?,
    };
    let not_found = || RunnerError::ToolNotFound {
        program: "ST-LINK_gdbserver (from STM32CubeCLT)",
        root: root.clone(),
        pattern: INSTALL_PATTERN,
    };
    if !host.is_dir(&root) {
        return Err(not_found());
    }
    let newest = discover(host, &root)?
        .into_iter()
        .max_by_key(|candidate| candidate.version.linear())
        .ok_or_else(not_found)?;
    log::info!("Using STM32CubeCLT {} at {}", newest.version, newest.path.display());

    let server = newest
        .path
        .join("STLink-gdb-server")
        .join("bin")
        .join(format!("{}{}", GDB_SERVER, platform.exe_suffix()));
    let programmer_dir = newest.path.join("STM32CubeProgrammer").join("bin");
    Ok(ToolInstallation { version: Some(newest.version), server, programmer_dir })
}

/// Lists the versioned installations directly under `root`.
pub fn discover(host: &dyn Host, root: &Path) -> Result<Vec<Candidate>> {
    let pattern = Regex::new(INSTALL_PATTERN).expect("install pattern is a valid regex");
    let mut candidates = Vec::new();
    for path in host.list_dir(root)? {
        if !host.is_dir(&path) {
            continue;
        }
        let version = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| Version::from_install_name(&pattern, name));
        match version {
            Some(version) => {
                log::debug!("Found STM32CubeCLT {} at {}", version, path.display());
                candidates.push(Candidate { version, path });
            }
            None => log::trace!("Ignoring {}", path.display()),
        }
    }
    Ok(candidates)
}
