//! Dispatcher - runs one command from lookup to connection release

use crate::broker::{ConnectionBroker, ConnectionError, DeviceConnection};
use crate::context::{Cancellation, ExecContext};
use crate::flags::{validate, FlagSet, ValidationError};
use crate::limits::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::registry::{Command, CommandRegistry};
use crate::relay::ConsoleRelay;
use anyhow::anyhow;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

/// Why a command did not complete
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command}")]
    Validation {
        command: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error("{command}")]
    Connection {
        command: &'static str,
        #[source]
        source: ConnectionError,
    },

    #[error("{command} failed")]
    Handler {
        command: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// Name of the command that failed, if one was selected
    pub fn command(&self) -> Option<&'static str> {
        match self {
            DispatchError::UnknownCommand(_) => None,
            DispatchError::Validation { command, .. }
            | DispatchError::Connection { command, .. }
            | DispatchError::Handler { command, .. } => Some(*command),
        }
    }

    /// The error and all of its causes, joined with `: `
    pub fn report(&self) -> String {
        let mut text = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            text.push_str(": ");
            text.push_str(&err.to_string());
            cause = std::error::Error::source(err);
        }
        text
    }

    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }
}

/// Executes exactly one command per invocation
pub struct Dispatcher {
    program: String,
    registry: Arc<CommandRegistry>,
    /// Runs when no command name (or its own name) is given
    default_command: Command,
    broker: ConnectionBroker,
    relay: ConsoleRelay,
    cancel: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        program: impl Into<String>,
        registry: Arc<CommandRegistry>,
        default_command: Command,
        broker: ConnectionBroker,
        relay: ConsoleRelay,
        cancellation: &Cancellation,
    ) -> Self {
        Self {
            program: program.into(),
            registry,
            default_command,
            broker,
            relay,
            cancel: cancellation.subscribe(),
        }
    }

    /// Run a command and map the outcome to a process exit code
    ///
    /// Errors are written to stderr.
    pub async fn run(&self, args: &[String], flags: Arc<FlagSet>) -> ExitCode {
        match self.dispatch(args, flags).await {
            Ok(()) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                eprint!("{}", self.render_error(&e));
                ExitCode::from(e.exit_code())
            }
        }
    }

    /// Text written to stderr for a failed dispatch
    pub fn render_error(&self, err: &DispatchError) -> String {
        match err {
            DispatchError::UnknownCommand(name) => format!(
                "Unknown command: {}. Run \"{} help\"\n\n{}",
                name,
                self.program,
                self.registry.usage(&self.program, false)
            ),
            _ => format!("Error: {}\n", err.report()),
        }
    }

    /// Select, validate, connect, execute, release
    pub async fn dispatch(
        &self,
        args: &[String],
        flags: Arc<FlagSet>,
    ) -> Result<(), DispatchError> {
        let command = self.select(args.first().map(String::as_str))?;
        debug!(
            "Selected command: {} (device {})",
            command.name, command.connection
        );

        validate(command.required, &flags).map_err(|source| DispatchError::Validation {
            command: command.name,
            source,
        })?;

        let ctx = ExecContext::new(
            command.name,
            args.iter().skip(1).cloned().collect(),
            flags,
            self.registry.clone(),
            self.relay.clone(),
            self.cancel.clone(),
        );

        let mut conn = self
            .broker
            .acquire_if_needed(command.connection, &ctx)
            .await
            .map_err(|source| DispatchError::Connection {
                command: command.name,
                source,
            })?;

        // From here on the connection must be released on every path
        let handle: Option<&mut dyn DeviceConnection> = match conn.as_mut() {
            Some(c) => Some(c.as_mut()),
            None => None,
        };
        let outcome = AssertUnwindSafe(command.handler.execute(&ctx, handle))
            .catch_unwind()
            .await;

        if let Some(conn) = conn.take() {
            self.broker.release(conn).await;
        }

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(anyhow!("handler panicked: {}", panic_message(&*payload))),
        };

        match result {
            Ok(()) => {
                info!("{} completed", command.name);
                Ok(())
            }
            Err(source) => {
                info!("{} failed: {:#}", command.name, source);
                Err(DispatchError::Handler {
                    command: command.name,
                    source,
                })
            }
        }
    }

    fn select(&self, name: Option<&str>) -> Result<&Command, DispatchError> {
        match name {
            None => Ok(&self.default_command),
            Some(name) if name == self.default_command.name => Ok(&self.default_command),
            Some(name) => self
                .registry
                .lookup(name)
                .ok_or_else(|| DispatchError::UnknownCommand(name.to_string())),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
