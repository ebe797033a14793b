//! Execution context handed to command handlers

use crate::flags::FlagSet;
use crate::registry::CommandRegistry;
use crate::relay::ConsoleRelay;
use std::sync::Arc;
use tokio::sync::watch;

/// Source of the cancellation signal (e.g. wired to Ctrl-C)
#[derive(Debug)]
pub struct Cancellation {
    tx: watch::Sender<bool>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Signal every context created from this source
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Everything a handler can see about the current invocation
#[derive(Debug, Clone)]
pub struct ExecContext {
    command: &'static str,
    args: Vec<String>,
    flags: Arc<FlagSet>,
    registry: Arc<CommandRegistry>,
    relay: ConsoleRelay,
    cancel: watch::Receiver<bool>,
}

impl ExecContext {
    pub fn new(
        command: &'static str,
        args: Vec<String>,
        flags: Arc<FlagSet>,
        registry: Arc<CommandRegistry>,
        relay: ConsoleRelay,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            command,
            args,
            flags,
            registry,
            relay,
            cancel,
        }
    }

    /// Name of the command being executed
    pub fn command(&self) -> &'static str {
        self.command
    }

    /// Positional arguments after the command name
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn relay(&self) -> &ConsoleRelay {
        &self.relay
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once cancellation has been requested
    ///
    /// Never resolves if the cancellation source is dropped without firing.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        let fired = rx.wait_for(|&c| c).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}
