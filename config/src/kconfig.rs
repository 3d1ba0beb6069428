//! Kconfig build configuration (`.config`) reader.

use crate::ConfigError;
use std::{fs, path::Path};

/// Flat `KEY=VALUE` build configuration as written by Kconfig.
///
/// Entries keep the order they appear in the file. Comments (`#`) and blank
/// lines are skipped, and double quotes around string values are removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildConfig {
    entries: Vec<(String, String)>,
}

impl BuildConfig {
    /// Reads and parses the file at `path`.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Ok(Self::parse(&text))
    }

    /// Parses configuration text. Lines without `=` are ignored.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    entries.push((key.trim().to_string(), unquote(value.trim()).to_string()));
                }
                _ => log::debug!("Skipping malformed build config line {}: {:?}", number + 1, line),
            }
        }
        Self { entries }
    }

    /// Returns the value of the first entry named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter().find_map(|(k, v)| (k == key).then(|| v))
    }

    /// Returns whether `key` is set to `y`.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.get(key) == Some("y")
    }

    /// Iterates over entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
#
# Automatically generated file; DO NOT EDIT.
#
CONFIG_BOARD=\"stm32n6570_dk\"
CONFIG_SOC_SERIES_STM32N6X=y
CONFIG_SOC_STM32N657XX=y
# CONFIG_BOOTLOADER_MCUBOOT is not set

CONFIG_FLASH_BASE_ADDRESS=0x70000000
garbage line
";

    #[test]
    fn parses_entries_in_order() {
        let config = BuildConfig::parse(SAMPLE);
        let keys: Vec<_> = config.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            [
                "CONFIG_BOARD",
                "CONFIG_SOC_SERIES_STM32N6X",
                "CONFIG_SOC_STM32N657XX",
                "CONFIG_FLASH_BASE_ADDRESS",
            ]
        );
    }

    #[test]
    fn strips_quotes_and_reads_flags() {
        let config = BuildConfig::parse(SAMPLE);
        assert_eq!(config.get("CONFIG_BOARD"), Some("stm32n6570_dk"));
        assert!(config.is_enabled("CONFIG_SOC_SERIES_STM32N6X"));
        assert!(!config.is_enabled("CONFIG_BOOTLOADER_MCUBOOT"));
        assert!(!config.is_enabled("CONFIG_FLASH_BASE_ADDRESS"));
    }

    #[test]
    fn empty_text() {
        assert_eq!(BuildConfig::parse(""), BuildConfig::default());
        assert_eq!(BuildConfig::parse("# only a comment\n").iter().count(), 0);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BuildConfig::read(&dir.path().join(".config")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
