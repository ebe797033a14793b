//! Command registry - static table of command descriptors

use crate::broker::DeviceConnection;
use crate::context::ExecContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;

/// How strictly a command needs a device connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRequirement {
    /// Command cannot run without a device
    Required,
    /// Try to connect, run without a device if that fails
    Optional,
    /// Never connect
    NotNeeded,
}

impl std::fmt::Display for ConnectionRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionRequirement::Required => write!(f, "required"),
            ConnectionRequirement::Optional => write!(f, "optional"),
            ConnectionRequirement::NotNeeded => write!(f, "not needed"),
        }
    }
}

/// The operation bound to a command name
///
/// Handlers must not assume `conn` is present unless their command is
/// registered with [`ConnectionRequirement::Required`].
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(
        &self,
        ctx: &ExecContext,
        conn: Option<&mut dyn DeviceConnection>,
    ) -> anyhow::Result<()>;
}

/// Immutable command descriptor
#[derive(Clone)]
pub struct Command {
    pub name: &'static str,
    pub handler: Arc<dyn CommandHandler>,
    /// One-line description for help output
    pub short: &'static str,
    /// Flags that must be supplied before the handler runs
    pub required: &'static [&'static str],
    /// Flags the command reads (advisory)
    pub optional: &'static [&'static str],
    pub connection: ConnectionRequirement,
    /// Hidden from help unless `--full` is given
    pub advanced: bool,
}

impl Command {
    /// Create a descriptor with no flags that never connects
    pub fn new(name: &'static str, short: &'static str, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            name,
            handler,
            short,
            required: &[],
            optional: &[],
            connection: ConnectionRequirement::NotNeeded,
            advanced: false,
        }
    }

    pub fn required(mut self, flags: &'static [&'static str]) -> Self {
        self.required = flags;
        self
    }

    pub fn optional(mut self, flags: &'static [&'static str]) -> Self {
        self.optional = flags;
        self
    }

    pub fn connection(mut self, requirement: ConnectionRequirement) -> Self {
        self.connection = requirement;
        self
    }

    pub fn advanced(mut self) -> Self {
        self.advanced = true;
        self
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("connection", &self.connection)
            .field("advanced", &self.advanced)
            .finish_non_exhaustive()
    }
}

/// Errors raised while building the registry
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate command name: {0}")]
    Duplicate(&'static str),
}

/// Read-only table of commands, looked up by exact name
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
    index: HashMap<&'static str, usize>,
}

impl CommandRegistry {
    /// Build the registry, rejecting duplicate names
    pub fn new(commands: Vec<Command>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(commands.len());
        for (pos, cmd) in commands.iter().enumerate() {
            if index.insert(cmd.name, pos).is_some() {
                return Err(RegistryError::Duplicate(cmd.name));
            }
        }
        Ok(Self { commands, index })
    }

    /// Find a command by exact name
    pub fn lookup(&self, name: &str) -> Option<&Command> {
        self.index.get(name).map(|&pos| &self.commands[pos])
    }

    /// Commands in registration order
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Render help text. Advanced commands are listed only when `full` is set.
    pub fn usage(&self, program: &str, full: bool) -> String {
        let mut out = format!("Usage: {} <command> [flags]\n\nCommands:\n", program);
        let width = self
            .commands()
            .filter(|c| full || !c.advanced)
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0);

        for cmd in self.commands().filter(|c| full || !c.advanced) {
            let _ = writeln!(out, "  {:<width$}  {}", cmd.name, cmd.short, width = width);
            if !cmd.required.is_empty() {
                let _ = writeln!(
                    out,
                    "  {:<width$}    required: {}",
                    "",
                    flag_list(cmd.required),
                    width = width
                );
            }
            if full && !cmd.optional.is_empty() {
                let _ = writeln!(
                    out,
                    "  {:<width$}    optional: {}",
                    "",
                    flag_list(cmd.optional),
                    width = width
                );
            }
        }

        if !full {
            let _ = write!(out, "\nRun \"{} help --full\" to show advanced commands\n", program);
        }
        out
    }
}

fn flag_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("--{}", n))
        .collect::<Vec<_>>()
        .join(", ")
}
