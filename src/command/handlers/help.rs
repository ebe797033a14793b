//! Help and version handlers

use super::PROGRAM;
use crate::cli;
use anyhow::Result;
use async_trait::async_trait;
use devctl_core::{CommandHandler, DeviceConnection, ExecContext};

/// Render the help text for the current invocation
pub fn help_text(ctx: &ExecContext) -> String {
    let full = ctx.flags().get_bool("full");
    let mut text = ctx.registry().usage(PROGRAM, full);
    text.push_str("\nRun without a command to start the interactive console.\n");
    if full {
        text.push('\n');
        text.push_str(&cli::flags_help());
        text.push_str(&format!(
            "\nEvery flag can also be set through an environment variable prefixed with {}\n",
            cli::ENV_PREFIX
        ));
    }
    text
}

/// `help`: list commands; `--full` adds advanced commands and all flags
pub struct Help;

#[async_trait]
impl CommandHandler for Help {
    async fn execute(
        &self,
        ctx: &ExecContext,
        _conn: Option<&mut dyn DeviceConnection>,
    ) -> Result<()> {
        print!("{}", help_text(ctx));
        Ok(())
    }
}

/// `version`: print tool name and version
pub struct Version;

pub fn version_text() -> String {
    format!(
        "The {} command line device management tool\nVersion: {}\n",
        PROGRAM,
        env!("CARGO_PKG_VERSION")
    )
}

#[async_trait]
impl CommandHandler for Version {
    async fn execute(
        &self,
        _ctx: &ExecContext,
        _conn: Option<&mut dyn DeviceConnection>,
    ) -> Result<()> {
        print!("{}", version_text());
        Ok(())
    }
}
