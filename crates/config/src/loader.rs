//! Configuration file loader

use figment::{
    providers::{Format, Json, Toml, Yaml},
    Figment,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use types::ConfigError;

/// Read a configuration file into flat `section.key` string pairs
///
/// The format is chosen from the file extension: `yaml`/`yml`, `json` or
/// `toml`. Nested sections are joined with `.`, sequences are joined with
/// `,` and null values become empty strings.
pub fn load_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let display = path.display().to_string();

    if !path.exists() {
        return Err(ConfigError::FileNotFound { path: display });
    }
    if !path.is_file() {
        return Err(ConfigError::FileRead {
            path: display,
            message: "not a regular file".to_string(),
        });
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let figment = match extension.as_deref() {
        Some("yaml") | Some("yml") => Figment::from(Yaml::file(path)),
        Some("json") => Figment::from(Json::file(path)),
        Some("toml") => Figment::from(Toml::file(path)),
        other => {
            return Err(ConfigError::FileRead {
                path: display,
                message: format!("unsupported config type {:?}", other.unwrap_or("")),
            })
        }
    };

    let root: Value = figment.extract().map_err(|e| ConfigError::FileRead {
        path: display.clone(),
        message: e.to_string(),
    })?;

    let mut values = BTreeMap::new();
    match root {
        Value::Object(_) => flatten("", &root, &mut values),
        _ => {
            return Err(ConfigError::FileRead {
                path: display,
                message: "top level must be a mapping".to_string(),
            })
        }
    }

    Ok(values)
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&key, child, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), scalar(leaf));
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(scalar).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}
