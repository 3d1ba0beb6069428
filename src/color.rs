//! Terminal coloring.

use std::{
    io::{stderr, IsTerminal},
    str::FromStr,
};

/// Coloring preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// Color when stderr is a terminal.
    Auto,
    /// Always color.
    Always,
    /// Never color.
    Never,
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            _ => Err(format!("invalid color preference `{}` (auto, always, never)", s)),
        }
    }
}

impl Color {
    /// Returns `true` if output should be colored.
    pub fn is_enabled(self) -> bool {
        match self {
            Self::Auto => stderr().is_terminal(),
            Self::Always => true,
            Self::Never => false,
        }
    }

    /// Renders `text` in bold `color` if enabled.
    pub fn bold_fg(self, text: &str, color: ansi_term::Color) -> String {
        if self.is_enabled() {
            color.bold().paint(text).to_string()
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!("never".parse::<Color>(), Ok(Color::Never));
        assert!("sometimes".parse::<Color>().is_err());
    }

    #[test]
    fn never_is_plain() {
        assert_eq!(Color::Never.bold_fg("Error", ansi_term::Color::Red), "Error");
        assert_ne!(Color::Always.bold_fg("Error", ansi_term::Color::Red), "Error");
    }
}
