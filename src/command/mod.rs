//! Command table for the devctl binary
//!
//! This module handles:
//! - Declaring every built-in command with its flags and connection policy
//! - The default command run when no command name is given

pub mod handlers;

use devctl_core::{Command, CommandRegistry, ConnectionRequirement, RegistryError};
use std::sync::Arc;

/// Name that selects the default mode explicitly
pub const DEFAULT_COMMAND: &str = "ui";

/// Build the registry of built-in commands
pub fn build_registry() -> Result<CommandRegistry, RegistryError> {
    CommandRegistry::new(vec![
        Command::new("console", "Simple device console", Arc::new(handlers::Console))
            .optional(&["port", "baud"])
            .connection(ConnectionRequirement::Optional),
        Command::new(
            "send",
            "Send a line to the device and show its output",
            Arc::new(handlers::SendLine),
        )
        .required(&["data"])
        .optional(&["port", "baud", "wait"])
        .connection(ConnectionRequirement::Required),
        Command::new(
            "help",
            "Show help. Add --full to show advanced commands",
            Arc::new(handlers::Help),
        )
        .optional(&["full"]),
        Command::new("version", "Show version", Arc::new(handlers::Version)),
        // advanced commands
        Command::new("ports", "Show serial ports", Arc::new(handlers::Ports)).advanced(),
    ])
}

/// The command run with no name or with `ui`
pub fn default_command() -> Command {
    Command::new(
        DEFAULT_COMMAND,
        "Start the interactive console",
        Arc::new(handlers::Interactive),
    )
    .optional(&["port", "baud"])
    .connection(ConnectionRequirement::Optional)
}
