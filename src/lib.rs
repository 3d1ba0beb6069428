//! Runner for debugging STM32 firmware with the ST-LINK GDB server from
//! STM32CubeCLT.
//!
//! A session is planned in three steps: [`probe::toolchain`] finds the GDB
//! server, [`probe::boot`] works out how the firmware boots, and
//! [`probe::plan`] picks the server flags and GDB commands for that boot
//! mode. [`probe::DebugSession`] then runs the server and the debugger as
//! one unit.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod cli;
pub mod cmd;
pub mod color;
pub mod error;
pub mod host;
pub mod probe;
pub mod utils;
