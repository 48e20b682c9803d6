//! Layered configuration resolution

use crate::entry::{append_builtin_entries, Entry, CONFIG_FLAG, ENVIRONMENT_FLAG};
use crate::flags::FlagSet;
use crate::loader::load_file;
use crate::resolved::Config;
use crate::store::ValueStore;
use crate::validation::EntryValidator;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use types::{ConfigError, Environment};

const DEFAULT_PROGRAM_NAME: &str = "service";

/// Resolves configuration entries from flags, environment and file
///
/// Sources are applied in a fixed order, each one overriding the previous
/// for the same key:
///
///  1. The config file and runtime environment entries are appended.
///  2. Static defaults are set for every entry.
///  3. Environment variables are bound.
///  4. Program arguments are parsed.
///  5. The config file is read.
///  6. The runtime environment is validated.
///
/// Steps 5 and 6 read their inputs from the store, so the config file path
/// and the environment come from the flag, environment variable or default
/// layers only.
#[derive(Debug, Clone)]
pub struct Resolver {
    program: String,
    args: Option<Vec<OsString>>,
}

impl Resolver {
    /// Create a resolver parsing the process arguments
    pub fn new() -> Self {
        let program = std::env::args_os()
            .next()
            .and_then(|arg0| {
                Path::new(&arg0)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| DEFAULT_PROGRAM_NAME.to_string());

        Self {
            program,
            args: None,
        }
    }

    /// Create a resolver parsing `args`, given without the program name
    pub fn with_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self {
            program: DEFAULT_PROGRAM_NAME.to_string(),
            args: Some(args.into_iter().map(Into::into).collect()),
        }
    }

    /// Set the program name shown in usage messages
    pub fn program_name(mut self, name: impl Into<String>) -> Self {
        self.program = name.into();
        self
    }

    /// Resolve `entries` into `store` and validate the runtime environment
    ///
    /// The built-in entries are appended to `entries`. No configuration is
    /// returned when any step fails.
    pub fn resolve(
        &self,
        entries: &mut Vec<Entry>,
        store: &mut ValueStore,
    ) -> Result<Config, ConfigError> {
        append_builtin_entries(entries);

        let report = EntryValidator::validate(entries);
        for issue in &report.errors {
            error!(field = %issue.field, "{}", issue.message);
        }
        for issue in &report.warnings {
            warn!(field = %issue.field, "{}", issue.message);
        }
        if report.has_errors() {
            error!("{}", report.summary());
        } else if report.has_warnings() {
            warn!("{}", report.summary());
        }

        set_default_values(entries, store);

        init_env(entries, store).map_err(|e| e.in_step("init_env"))?;

        // flags override the environment
        init_flags(&self.program, entries, store, self.args())
            .map_err(|e| e.in_step("init_flags"))?;

        let config_file = PathBuf::from(store.get_string(CONFIG_FLAG));
        set_config_file(&config_file, store).map_err(|e| e.in_step("read_config_file"))?;

        let environment_value = store.get_string(ENVIRONMENT_FLAG);
        let environment =
            Environment::lookup(&environment_value).map_err(|e| e.in_step("environment"))?;

        info!(
            environment = %environment,
            on_cloud = environment.on_cloud(),
            config_file = %config_file.display(),
            "Configuration resolved"
        );

        Ok(Config::new(environment, config_file, store.all_settings()))
    }

    fn args(&self) -> Vec<OsString> {
        match &self.args {
            Some(args) => args.clone(),
            None => std::env::args_os().skip(1).collect(),
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Seed the default of every entry under its flag and environment keys
fn set_default_values(entries: &[Entry], store: &mut ValueStore) {
    for entry in entries {
        store.set_default(&entry.flag, entry.default_value.clone());
        if entry.has_env_source() {
            store.set_default(&entry.env_key, entry.default_value.clone());
        }
    }
    debug!(count = entries.len(), "Default values set");
}

/// Bind every entry that has an environment source
fn init_env(entries: &[Entry], store: &mut ValueStore) -> Result<(), ConfigError> {
    for entry in entries.iter().filter(|e| e.has_env_source()) {
        store.bind_env(&entry.flag, &entry.env_key)?;
        debug!(flag = %entry.flag, env_key = %entry.env_key, "Environment variable bound");
    }
    Ok(())
}

/// Register one flag per entry, parse `args` and record supplied values
fn init_flags(
    program: &str,
    entries: &[Entry],
    store: &mut ValueStore,
    args: Vec<OsString>,
) -> Result<(), ConfigError> {
    let mut flags = FlagSet::new(program);
    for entry in entries {
        if !flags.add_string(entry)? {
            debug!(flag = %entry.flag, "Flag already registered");
        }
    }

    for (flag, value) in flags.parse(args)? {
        debug!(flag = %flag, "Flag supplied");
        store.set_flag(&flag, value);
    }
    Ok(())
}

/// Read the config file into the store's file layer
fn set_config_file(path: &Path, store: &mut ValueStore) -> Result<(), ConfigError> {
    let values = load_file(path)?;

    let (builtin, values): (Vec<_>, Vec<_>) = values
        .into_iter()
        .partition(|(key, _)| is_builtin_key(key));
    for (key, _) in builtin {
        warn!(
            key = %key,
            path = %path.display(),
            "Ignoring built-in key in config file"
        );
    }

    debug!(path = %path.display(), count = values.len(), "Config file read");
    store.merge_file(values);
    Ok(())
}

fn is_builtin_key(key: &str) -> bool {
    key.eq_ignore_ascii_case(CONFIG_FLAG) || key.eq_ignore_ascii_case(ENVIRONMENT_FLAG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Layer;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config_path: String,
    }

    fn fixture(content: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, content).unwrap();
        Fixture {
            config_path: path.to_string_lossy().into_owned(),
            _dir: dir,
        }
    }

    fn client_id_entries() -> Vec<Entry> {
        vec![
            Entry::new("flag", "default", "description", "KEY"),
            Entry::new("client-id", "", "", "CLIENT_ID"),
        ]
    }

    #[test]
    fn test_defaults_without_overrides() {
        let fx = fixture("unrelated: value\n");
        let mut entries = vec![
            Entry::new("flag", "default", "description", "KEY"),
            Entry::new("region", "europe-west1", "deployment region", ""),
        ];
        let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

        let config = Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut entries, &mut store)
            .unwrap();

        assert_eq!(store.get_string("flag"), "default");
        assert_eq!(store.get_string("KEY"), "default");
        assert_eq!(store.get_string("region"), "europe-west1");
        assert_eq!(store.get_string("env"), "prd");
        assert_eq!(store.source("flag"), Some(Layer::Default));
        assert_eq!(config.environment(), Environment::Production);
        assert_eq!(config.get("region"), Some("europe-west1"));
    }

    #[test]
    fn test_builtin_entries_are_appended_to_input() {
        let fx = fixture("unrelated: value\n");
        let mut entries = client_id_entries();
        let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

        Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut entries, &mut store)
            .unwrap();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[2].flag, "config");
        assert_eq!(entries[3].flag, "env");
    }

    #[test]
    fn test_entry_from_env() {
        let fx = fixture("unrelated: value\n");
        let mut entries = client_id_entries();
        let mut store = ValueStore::with_env([("CLIENT_ID", "from-env")]);

        Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut entries, &mut store)
            .unwrap();

        assert_eq!(store.get_string("client-id"), "from-env");
        assert_eq!(store.source("client-id"), Some(Layer::Env));
    }

    #[test]
    fn test_entry_flag_overrides_env() {
        let fx = fixture("unrelated: value\n");
        let mut entries = client_id_entries();
        let mut store = ValueStore::with_env([("CLIENT_ID", "from-env")]);

        let config = Resolver::with_args([
            "--config",
            fx.config_path.as_str(),
            "--client-id",
            "from-flag",
        ])
        .resolve(&mut entries, &mut store)
        .unwrap();

        assert_eq!(store.get_string("client-id"), "from-flag");
        assert_eq!(config.get("client-id"), Some("from-flag"));
    }

    #[test]
    fn test_entry_flag_overrides_file() {
        let fx = fixture("client-id: from-file\n");
        let mut entries = client_id_entries();
        let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

        let config = Resolver::with_args([
            "--config",
            fx.config_path.as_str(),
            "--client-id",
            "from-flag",
        ])
        .resolve(&mut entries, &mut store)
        .unwrap();

        assert_eq!(store.get_string("client-id"), "from-flag");
        assert_eq!(store.source("client-id"), Some(Layer::Flag));
        assert_eq!(config.get("client-id"), Some("from-flag"));
    }

    #[test]
    fn test_config_path_from_env() {
        let fx = fixture("unrelated: value\n");
        let mut entries = client_id_entries();
        let mut store = ValueStore::with_env([("CONFIG", fx.config_path.as_str())]);

        let config = Resolver::with_args(Vec::<String>::new())
            .resolve(&mut entries, &mut store)
            .unwrap();

        assert_eq!(config.config_file(), Path::new(&fx.config_path));
    }

    #[test]
    fn test_config_path_flag_overrides_env() {
        let fx = fixture("unrelated: value\n");
        let mut entries = client_id_entries();
        let mut store = ValueStore::with_env([("CONFIG", "config.yaml")]);

        Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut entries, &mut store)
            .unwrap();

        assert_eq!(store.get_string("config"), fx.config_path);
    }

    #[test]
    fn test_file_values_between_env_and_default() {
        let fx = fixture("client-id: from-file\nregion: us-east1\nenv: dev\nconfig: other.yaml\n");
        let mut entries = vec![
            Entry::new("client-id", "", "", "CLIENT_ID"),
            Entry::new("region", "europe-west1", "", "REGION"),
        ];
        let mut store = ValueStore::with_env([("CLIENT_ID", "from-env")]);

        let config = Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut entries, &mut store)
            .unwrap();

        assert_eq!(store.get_string("client-id"), "from-env");
        assert_eq!(store.get_string("region"), "us-east1");
        assert_eq!(store.source("region"), Some(Layer::File));
        // built-in keys in the file are ignored
        assert_eq!(config.environment(), Environment::Production);
        assert_eq!(store.get_string("config"), fx.config_path);
    }

    #[test]
    fn test_every_alias_resolves() {
        let fx = fixture("unrelated: value\n");
        for env in Environment::ALL {
            for alias in env.aliases() {
                let mut entries = client_id_entries();
                let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

                let config =
                    Resolver::with_args(["--env", *alias, "--config", fx.config_path.as_str()])
                        .resolve(&mut entries, &mut store)
                        .unwrap();

                assert_eq!(store.get_string("env"), *alias);
                assert_eq!(config.environment(), env);
            }
        }
    }

    #[test]
    fn test_env_prod_is_on_cloud() {
        let fx = fixture("unrelated: value\n");
        let mut entries = Vec::new();
        let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

        let config = Resolver::with_args(["--env", "prod", "--config", fx.config_path.as_str()])
            .resolve(&mut entries, &mut store)
            .unwrap();

        assert_eq!(config.environment(), Environment::Production);
        assert!(config.environment().on_cloud());
    }

    #[test]
    fn test_environment_from_env_var() {
        let fx = fixture("unrelated: value\n");
        let mut entries = Vec::new();
        let mut store = ValueStore::with_env([("ENV", "development")]);

        let config = Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut entries, &mut store)
            .unwrap();

        assert_eq!(config.environment(), Environment::Development);
        assert!(!config.environment().on_cloud());
    }

    #[test]
    fn test_invalid_environment() {
        let fx = fixture("unrelated: value\n");
        for value in ["devv", "prd ", "", " ", "Production"] {
            let mut entries = client_id_entries();
            let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

            let err = Resolver::with_args(["--env", value, "--config", fx.config_path.as_str()])
                .resolve(&mut entries, &mut store)
                .unwrap_err();

            assert!(err
                .to_string()
                .contains(&format!("no suitable environment found for {}", value)));
            assert!(matches!(
                err.root(),
                ConfigError::UnknownEnvironment { value: rejected } if rejected == value
            ));
        }
    }

    #[test]
    fn test_missing_default_config_file() {
        let mut entries = client_id_entries();
        let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

        let err = Resolver::with_args(Vec::<String>::new())
            .resolve(&mut entries, &mut store)
            .unwrap_err();

        assert!(err.to_string().starts_with("read_config_file: "));
        assert!(matches!(
            err.root(),
            ConfigError::FileNotFound { path } if path == "config/config.yaml"
        ));
        // defaults are still visible in the store
        assert_eq!(store.get_string("env"), "prd");
        assert_eq!(store.get_string("config"), "config/config.yaml");
    }

    #[test]
    fn test_empty_flag_with_env_key_fails_binding() {
        let fx = fixture("unrelated: value\n");
        let mut entries = vec![Entry::new("", "", "", "ORPHAN")];
        let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

        let err = Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut entries, &mut store)
            .unwrap_err();

        assert!(matches!(err, ConfigError::Step { step: "init_env", .. }));
        assert!(matches!(err.root(), ConfigError::Binding { .. }));
    }

    #[test]
    fn test_empty_flag_without_env_key_fails_registration() {
        let fx = fixture("unrelated: value\n");
        let mut entries = vec![Entry::new("", "x", "", "")];
        let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

        let err = Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut entries, &mut store)
            .unwrap_err();

        assert!(matches!(err, ConfigError::Step { step: "init_flags", .. }));
        assert!(matches!(
            err.root(),
            ConfigError::Flags(message) if message.contains("empty")
        ));
    }

    #[test]
    fn test_unknown_flag_fails() {
        let mut entries = client_id_entries();
        let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

        let err = Resolver::with_args(["--bogus", "1"])
            .resolve(&mut entries, &mut store)
            .unwrap_err();

        assert!(matches!(err, ConfigError::Step { step: "init_flags", .. }));
        assert!(matches!(err.root(), ConfigError::Flags(_)));
    }

    #[test]
    fn test_duplicate_entries_are_tolerated() {
        let fx = fixture("unrelated: value\n");
        let mut entries = vec![Entry::config_file(), Entry::new("flag", "a", "", "")];
        let mut store = ValueStore::with_env(Vec::<(String, String)>::new());

        let result = Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut entries, &mut store);

        assert!(result.is_ok());
    }

    #[test]
    fn test_independent_resolutions_do_not_leak() {
        let fx = fixture("unrelated: value\n");

        let mut first = ValueStore::with_env([("CLIENT_ID", "first")]);
        Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut client_id_entries(), &mut first)
            .unwrap();

        let mut second = ValueStore::with_env(Vec::<(String, String)>::new());
        Resolver::with_args(["--config", fx.config_path.as_str()])
            .resolve(&mut client_id_entries(), &mut second)
            .unwrap();

        assert_eq!(first.get_string("client-id"), "first");
        assert_eq!(second.get_string("client-id"), "");
    }
}
