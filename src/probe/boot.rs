//! Boot-mode classification.
//!
//! The firmware's entry point tells whether it runs from the first-stage
//! bootloader window or from RAM. Outside those windows only the STM32N6
//! needs special handling: its application sits in external flash behind
//! MCUboot, which has to bring up the flash controller first.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use stlink_config::BuildConfig;

/// Base of the first-stage bootloader window (`0x3418_0000..=0x3418_FFFF`).
pub const FSBL_BASE: u32 = 0x3418_0000;

const FSBL_MASK: u32 = 0xFFFF_0000;

/// Start of the RAM window, which ends where the FSBL window begins.
pub const RAM_START: u32 = 0x3400_0000;

/// SoC family whose flash images boot through MCUboot.
pub const CHAINED_BOOT_FAMILY: &str = "STM32N6";

/// Family reported when the build configuration does not name one.
pub const UNKNOWN_FAMILY: &str = "unknown";

const SOC_SERIES_KEY: &str = "CONFIG_SOC_SERIES_";

/// Where and how the firmware executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Runs from the first-stage bootloader region.
    Fsbl,
    /// Runs from RAM.
    Ram,
    /// Runs from external flash after MCUboot hands over.
    FlashChained,
    /// Anything else; debugged like a plain flash target.
    Unknown,
}

impl ExecutionMode {
    /// All modes.
    pub const ALL: [Self; 4] = [Self::Fsbl, Self::Ram, Self::FlashChained, Self::Unknown];
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fsbl => "FSBL",
            Self::Ram => "RAM",
            Self::FlashChained => "flash (chained boot)",
            Self::Unknown => "unknown",
        })
    }
}

/// Classifies a firmware image by its entry point and SoC family.
///
/// An entry point of `0` means it could not be read and is never treated as
/// a chained-boot image.
pub fn classify(entry_point: u32, soc_family: &str) -> ExecutionMode {
    if entry_point & FSBL_MASK == FSBL_BASE {
        ExecutionMode::Fsbl
    } else if (RAM_START..FSBL_BASE).contains(&entry_point) {
        ExecutionMode::Ram
    } else if entry_point != 0 && soc_family == CHAINED_BOOT_FAMILY {
        ExecutionMode::FlashChained
    } else {
        ExecutionMode::Unknown
    }
}

/// Extracts the SoC family (e.g. `STM32N6`) from the first enabled
/// `CONFIG_SOC_SERIES_STM32*` entry.
pub fn soc_family(config: &BuildConfig) -> String {
    config
        .iter()
        .filter_map(|(key, _)| Some((key, key.strip_prefix(SOC_SERIES_KEY)?)))
        .find(|(key, series)| series.starts_with("STM32") && config.is_enabled(key))
        .map_or_else(|| UNKNOWN_FAMILY.to_string(), |(_, series)| series.chars().take(7).collect())
}

/// Path of the persisted build configuration inside `build_dir`.
pub fn build_config_path(build_dir: &Path) -> PathBuf {
    build_dir.join("zephyr").join(".config")
}

/// Reads the SoC family from `build_dir`. Falls back to [`UNKNOWN_FAMILY`]
/// when the configuration is missing or unreadable.
pub fn read_soc_family(build_dir: &Path) -> String {
    let path = build_config_path(build_dir);
    if !path.exists() {
        log::debug!("No build configuration at {}", path.display());
        return UNKNOWN_FAMILY.to_string();
    }
    match BuildConfig::read(&path) {
        Ok(config) => soc_family(&config),
        Err(err) => {
            log::warn!("Could not read build configuration: {}", err);
            UNKNOWN_FAMILY.to_string()
        }
    }
}

/// Reads the ELF entry point of `elf`. Returns `0` if it cannot be read.
pub fn read_entry_point(elf: &Path) -> u32 {
    match entry_point(elf) {
        Ok(entry) => entry,
        Err(err) => {
            log::warn!("Could not read entry point: {}", err);
            0
        }
    }
}

fn entry_point(elf: &Path) -> anyhow::Result<u32> {
    let bytes = fs::read(elf)?;
    let header = goblin::elf::Elf::parse_header(&bytes)?;
    u32::try_from(header.e_entry)
        .map_err(|_| anyhow::anyhow!("entry point {:#x} is not a 32-bit address", header.e_entry))
}

/// The firmware image under debug.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetBinary {
    /// ELF file.
    pub path: PathBuf,
    /// Build directory the ELF was produced in.
    pub build_dir: PathBuf,
    /// ELF entry point, `0` when unreadable.
    pub entry_point: u32,
}

impl TargetBinary {
    /// Reads the entry point of `path`.
    pub fn read(path: impl Into<PathBuf>, build_dir: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entry_point = read_entry_point(&path);
        Self { path, build_dir: build_dir.into(), entry_point }
    }

    /// Classifies the image, reading the SoC family from its build directory.
    pub fn execution_mode(&self) -> (ExecutionMode, String) {
        let soc_family = read_soc_family(&self.build_dir);
        let mode = classify(self.entry_point, &soc_family);
        log::info!("SoC: {}, Entry: {:#010x}, Mode: {}", soc_family, self.entry_point, mode);
        (mode, soc_family)
    }
}
