//! Global command-line flags
//!
//! Every flag is mirrored by an environment variable named `DEVCTL_<FLAG>`.
//! The parsed values are converted into a [`FlagSet`] recording where each
//! value came from, which is what required-flag validation looks at.

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use devctl_core::{FlagOrigin, FlagSet, FlagValue};
use std::ffi::OsString;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "DEVCTL_";

#[derive(Parser, Debug)]
#[allow(dead_code)] // most values are read through the FlagSet
#[command(
    name = "devctl",
    version,
    about = "Command-line device management tool",
    long_about = None
)]
pub struct GlobalFlags {
    /// Command to run; omit to start the interactive console
    #[arg(value_name = "COMMAND")]
    pub command: Option<String>,

    /// Arguments passed to the command
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,

    /// Device port: serial path, tcp://host:port, or auto
    #[arg(long, env = "DEVCTL_PORT", default_value = "auto")]
    pub port: String,

    /// Serial baud rate
    #[arg(long, env = "DEVCTL_BAUD", default_value_t = 115200)]
    pub baud: u32,

    /// Data to send to the device
    #[arg(long, env = "DEVCTL_DATA", default_value = "")]
    pub data: String,

    /// Seconds to keep relaying device output after sending
    #[arg(long, env = "DEVCTL_WAIT", default_value_t = 2)]
    pub wait: u64,

    /// Show full help, including advanced commands
    #[arg(long, env = "DEVCTL_FULL")]
    pub full: bool,

    /// Verbose logging
    #[arg(short, long, env = "DEVCTL_VERBOSE")]
    pub verbose: bool,

    /// Change into this directory first
    #[arg(short = 'C', long, env = "DEVCTL_CHDIR")]
    pub chdir: Option<PathBuf>,
}

/// One parsed invocation
#[derive(Debug)]
pub struct Invocation {
    pub flags: GlobalFlags,
    pub flag_set: FlagSet,
}

impl Invocation {
    /// Parse the process arguments, exiting on `--help`, `--version` or errors
    pub fn parse() -> Self {
        Self::try_parse_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cmd = GlobalFlags::command();
        let matches = cmd.try_get_matches_from_mut(itr)?;
        let flags = GlobalFlags::from_arg_matches(&matches)?;
        let flag_set = flag_set(&cmd, &matches);
        Ok(Self { flags, flag_set })
    }

    /// Positional arguments: command name first, then its arguments
    pub fn positional(&self) -> Vec<String> {
        self.flags
            .command
            .iter()
            .chain(self.flags.args.iter())
            .cloned()
            .collect()
    }
}

/// Rendered help for the global flags
pub fn flags_help() -> String {
    GlobalFlags::command().render_help().to_string()
}

fn flag_set(cmd: &clap::Command, matches: &ArgMatches) -> FlagSet {
    let mut set = FlagSet::new();

    for arg in cmd.get_arguments().filter(|a| !a.is_positional()) {
        let id = arg.get_id().as_str();
        if id == "help" || id == "version" {
            continue;
        }

        let default = join(arg.get_default_values().iter().map(|v| v.as_os_str()));
        let value = matches
            .get_raw(id)
            .map(join)
            .unwrap_or_default();
        let origin = match matches.value_source(id) {
            Some(ValueSource::CommandLine) => FlagOrigin::CommandLine,
            Some(ValueSource::EnvVariable) => FlagOrigin::Environment,
            _ => FlagOrigin::Default,
        };

        set.insert(
            id,
            FlagValue {
                value,
                default,
                origin,
            },
        );
    }

    set
}

fn join<'a>(values: impl Iterator<Item = &'a std::ffi::OsStr>) -> String {
    values
        .map(|v| v.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(",")
}
