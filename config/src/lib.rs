//! Configuration for `stlink-runner`.
//!
//! Two sources are handled here: the optional runner configuration file
//! ([`CONFIG_NAME`]) and the persisted build configuration the build system
//! leaves next to the firmware ([`BuildConfig`]).

#![warn(missing_docs)]

mod kconfig;

pub use self::kconfig::BuildConfig;

use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// The name of the runner configuration file.
pub const CONFIG_NAME: &str = "stlink-runner.toml";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read `{}`: {}", .path.display(), .source)]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML or has unexpected keys.
    #[error("failed to parse `{}`: {}", .path.display(), .source)]
    Parse {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },
}

/// The top-level runner configuration.
#[non_exhaustive]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// Debug probe and debugger settings.
    #[serde(default)]
    pub probe: Probe,
    /// Toolchain discovery settings.
    #[serde(default)]
    pub tools: Tools,
    /// Boot chain settings.
    #[serde(default)]
    pub boot: Boot,
}

/// `[probe]` section.
#[non_exhaustive]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Probe {
    /// Debugger client executable.
    pub gdb: Option<PathBuf>,
    /// GDB server port.
    pub port: Option<u16>,
    /// Debug access port.
    pub apid: Option<u32>,
    /// `false` selects JTAG.
    pub swd: Option<bool>,
    /// ST-LINK serial number.
    pub serial: Option<String>,
    /// External loader file name.
    pub extload: Option<String>,
    /// Run `Init()` from the external loader after reset.
    pub external_init: Option<bool>,
}

/// `[tools]` section.
#[non_exhaustive]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Tools {
    /// Directory scanned for versioned STM32CubeCLT installations instead of
    /// the platform default.
    pub root: Option<PathBuf>,
}

/// `[boot]` section.
#[non_exhaustive]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Boot {
    /// Flash address the application image is linked at behind the
    /// bootloader, e.g. `"0x08040000"`.
    pub app_offset: Option<String>,
    /// Seconds the debugger keeps retrying the server connection.
    pub connect_timeout: Option<u32>,
}

impl Config {
    /// Reads [`CONFIG_NAME`] from the current directory. A missing file
    /// yields the default configuration.
    pub fn read_from_current_dir() -> Result<Self, ConfigError> {
        let dir = env::current_dir()
            .map_err(|source| ConfigError::Read { path: PathBuf::from("."), source })?;
        Self::read_from_dir(&dir)
    }

    /// Reads [`CONFIG_NAME`] from `dir`. A missing file yields the default
    /// configuration.
    pub fn read_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_NAME);
        if !path.exists() {
            log::debug!("`{}` not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::read_from_file(&path)
    }

    /// Reads the configuration from `path`, which must exist.
    pub fn read_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        log::debug!("Loaded `{}`", path.display());
        Ok(config)
    }
}
