//! Command-line flag registration and parsing

use crate::entry::Entry;
use clap::{parser::ValueSource, value_parser, Arg, ArgAction, Command};
use std::collections::BTreeMap;
use std::ffi::OsString;
use types::ConfigError;

/// Set of string flags built at runtime from configuration entries
#[derive(Debug, Clone)]
pub struct FlagSet {
    command: Command,
    flags: Vec<String>,
}

impl FlagSet {
    /// Create an empty flag set for the program `name`
    pub fn new(name: impl Into<String>) -> Self {
        let command = Command::new(name.into())
            .args_override_self(true)
            .disable_version_flag(true);

        Self {
            command,
            flags: Vec::new(),
        }
    }

    /// Whether `flag` is already registered
    pub fn lookup(&self, flag: &str) -> bool {
        self.flags.iter().any(|known| known == flag)
    }

    /// Names of the registered flags, in registration order
    pub fn names(&self) -> &[String] {
        &self.flags
    }

    /// Register a string flag for `entry`
    ///
    /// Returns `false` when the flag was already registered, in which case
    /// the set is left untouched.
    pub fn add_string(&mut self, entry: &Entry) -> Result<bool, ConfigError> {
        validate_flag_name(&entry.flag)?;

        if self.lookup(&entry.flag) {
            return Ok(false);
        }

        let mut arg = Arg::new(entry.flag.clone())
            .long(entry.flag.clone())
            .help(entry.description.clone())
            .value_name("VALUE")
            .num_args(1)
            .allow_hyphen_values(true)
            .action(ArgAction::Set)
            .value_parser(value_parser!(String));
        if !entry.default_value.is_empty() {
            arg = arg.default_value(entry.default_value.clone());
        }

        let command = std::mem::take(&mut self.command);
        self.command = command.arg(arg);
        self.flags.push(entry.flag.clone());
        Ok(true)
    }

    /// Parse `args` (without the program name)
    ///
    /// Only flags explicitly present in `args` are returned.
    pub fn parse<I, T>(&self, args: I) -> Result<BTreeMap<String, String>, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let program = OsString::from(self.command.get_name());
        let argv = std::iter::once(program).chain(args.into_iter().map(Into::into));

        let matches = self
            .command
            .clone()
            .try_get_matches_from(argv)
            .map_err(|e| match e.kind() {
                clap::error::ErrorKind::DisplayHelp => ConfigError::HelpRequested {
                    usage: e.render().to_string(),
                },
                _ => ConfigError::Flags(e.render().to_string().trim_end().to_string()),
            })?;

        let mut supplied = BTreeMap::new();
        for flag in &self.flags {
            if matches.value_source(flag) != Some(ValueSource::CommandLine) {
                continue;
            }
            if let Some(value) = matches.get_one::<String>(flag) {
                supplied.insert(flag.clone(), value.clone());
            }
        }

        Ok(supplied)
    }

    /// Rendered usage text
    pub fn usage(&self) -> String {
        self.command.clone().render_help().to_string()
    }
}

fn validate_flag_name(flag: &str) -> Result<(), ConfigError> {
    if flag.is_empty() {
        return Err(ConfigError::Flags("flag name cannot be empty".to_string()));
    }
    if flag == "help" {
        return Err(ConfigError::Flags("flag name help is reserved".to_string()));
    }
    if flag.starts_with('-') || flag.contains('=') || flag.chars().any(char::is_whitespace) {
        return Err(ConfigError::Flags(format!("invalid flag name {:?}", flag)));
    }
    Ok(())
}
