//! Built-in command handlers

mod console;
mod help;
mod ports;
mod send;

pub use console::{Console, Interactive};
pub use help::{Help, Version};
pub use ports::Ports;
pub use send::SendLine;

/// Program name used in usage and diagnostics
pub const PROGRAM: &str = "devctl";
