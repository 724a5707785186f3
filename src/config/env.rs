//! Environment variable overrides.
//!
//! `SANJAGH__A__B__C=value` sets the key `a.b.c`. Values replacing a string
//! leaf are taken verbatim; anything else is parsed as a YAML scalar so that
//! numbers and booleans keep their type.

use super::{Config, ConfigError};
use crate::constants::{ENV_PREFIX, ENV_SEPARATOR};
use serde_json::Value;
use tracing::debug;

pub(super) fn apply_overrides<I>(config: Config, vars: I) -> Result<Config, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let prefix = format!("{ENV_PREFIX}{ENV_SEPARATOR}");
    let mut overrides: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(key, _)| key.starts_with(&prefix))
        .collect();
    if overrides.is_empty() {
        return Ok(config);
    }
    // Deterministic application order
    overrides.sort();

    let mut tree = serde_json::to_value(&config).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    for (key, raw) in overrides {
        let path: Vec<String> = key[prefix.len()..]
            .split(ENV_SEPARATOR)
            .map(str::to_lowercase)
            .collect();
        if path.iter().any(String::is_empty) {
            return Err(ConfigError::Env {
                key,
                message: "empty path segment".to_string(),
            });
        }
        set_path(&mut tree, &path, &raw).map_err(|message| ConfigError::Env {
            key: key.clone(),
            message,
        })?;
        debug!(key = %key, "Applied configuration override from environment");
    }

    serde_json::from_value(tree).map_err(|e| ConfigError::Invalid(e.to_string()))
}

fn set_path(tree: &mut Value, path: &[String], raw: &str) -> Result<(), String> {
    let Some((leaf, parents)) = path.split_last() else {
        return Err("empty key".to_string());
    };
    let mut node = tree;
    for segment in parents {
        let Value::Object(map) = node else {
            return Err(format!("'{segment}' is not a section"));
        };
        node = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    let Value::Object(map) = node else {
        return Err(format!("'{leaf}' is not inside a section"));
    };

    let value = match map.get(leaf) {
        Some(Value::String(_)) => Value::String(raw.to_string()),
        _ => serde_yaml::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    };
    map.insert(leaf.clone(), value);
    Ok(())
}
