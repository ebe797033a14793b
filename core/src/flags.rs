//! Supplied flag values and required-flag validation

use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

/// Where a flag value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagOrigin {
    /// Built-in default, nothing supplied
    #[default]
    Default,
    /// Mirrored environment variable
    Environment,
    /// Given on the command line
    CommandLine,
}

/// One global flag as seen by the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagValue {
    pub value: String,
    pub default: String,
    pub origin: FlagOrigin,
}

impl FlagValue {
    /// True when the flag was set explicitly or differs from its default
    pub fn is_supplied(&self) -> bool {
        match self.origin {
            FlagOrigin::CommandLine | FlagOrigin::Environment => true,
            FlagOrigin::Default => !self.value.is_empty() && self.value != self.default,
        }
    }
}

/// Global flag values of one invocation
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    flags: BTreeMap<String, FlagValue>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a flag still carrying its default
    pub fn with_default(mut self, name: impl Into<String>, default: impl Into<String>) -> Self {
        let default = default.into();
        self.flags.insert(
            name.into(),
            FlagValue {
                value: default.clone(),
                default,
                origin: FlagOrigin::Default,
            },
        );
        self
    }

    /// Insert or replace a flag
    pub fn insert(&mut self, name: impl Into<String>, value: FlagValue) {
        self.flags.insert(name.into(), value);
    }

    /// Set a flag explicitly, keeping a previously recorded default
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>, origin: FlagOrigin) {
        let entry = self.flags.entry(name.into()).or_default();
        entry.value = value.into();
        entry.origin = origin;
    }

    pub fn entry(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// Current value of a flag (default included)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(|f| f.value.as_str())
    }

    pub fn get_bool(&self, name: &str) -> bool {
        matches!(self.get(name), Some("true") | Some("1") | Some("yes"))
    }

    /// Parse a flag value, `Ok(None)` when the flag is unknown or empty
    pub fn get_parsed<T>(&self, name: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("Invalid value for --{}: {:?}: {}", name, raw, e)),
        }
    }

    pub fn is_supplied(&self, name: &str) -> bool {
        self.flags.get(name).is_some_and(FlagValue::is_supplied)
    }
}

/// One or more required flags were not supplied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Required flag(s) not set: {}", format_missing(.missing))]
pub struct ValidationError {
    pub missing: Vec<String>,
}

fn format_missing(missing: &[String]) -> String {
    missing
        .iter()
        .map(|m| format!("--{}", m))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check that every required flag has been supplied
///
/// All missing names are reported, in declaration order.
pub fn validate(required: &[&str], supplied: &FlagSet) -> Result<(), ValidationError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !supplied.is_supplied(name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { missing })
    }
}
