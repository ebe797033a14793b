//! devctl Dispatch Core
//!
//! This crate provides the pieces that turn one command-line invocation into
//! one handler execution: the command registry, required-flag validation,
//! the device connection broker, the console relay and the dispatcher that
//! ties them together.

pub mod broker;
pub mod context;
pub mod dispatcher;
pub mod flags;
pub mod registry;
pub mod relay;

#[cfg(test)]
mod testing;

// Re-export commonly used types at crate root
pub use broker::{ConnectionBroker, ConnectionError, DeviceConnection, DeviceConnector};
pub use context::{Cancellation, ExecContext};
pub use dispatcher::{DispatchError, Dispatcher};
pub use flags::{validate, FlagOrigin, FlagSet, FlagValue, ValidationError};
pub use registry::{Command, CommandHandler, CommandRegistry, ConnectionRequirement, RegistryError};
pub use relay::ConsoleRelay;

/// Fixed policy constants for the dispatch core
pub mod limits {
    use std::time::Duration;

    /// Console relay capacity in chunks
    pub const RELAY_CAPACITY: usize = 10;

    /// Upper bound for a single device connection attempt
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Connection attempts before the broker gives up
    pub const CONNECT_ATTEMPTS: u32 = 2;

    /// Pause between connection attempts
    pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

    /// Exit code for a successful command
    pub const EXIT_SUCCESS: u8 = 0;

    /// Exit code for any failure
    pub const EXIT_FAILURE: u8 = 1;
}
