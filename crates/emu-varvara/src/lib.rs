//! Headless Varvara computer.
//!
//! Varvara is the device fabric around the Uxn CPU: 16 devices of 16
//! memory-mapped ports each. This crate supplies the system, console and
//! datetime devices and the machine that wires them to the core; the
//! screen, controller, mouse and file devices are not emulated and their
//! ports behave as plain memory, which well-formed ROMs tolerate.

mod config;
mod console;
mod datetime;
mod system;
mod varvara;

pub use config::{DEFAULT_PAGES, VarvaraConfig};
pub use console::{CONSOLE_VECTOR, Console, ConsoleType};
pub use datetime::Datetime;
pub use system::System;
pub use varvara::{Devices, SCREEN_VECTOR, Varvara};
