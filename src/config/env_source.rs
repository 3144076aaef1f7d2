//! Variable source shared by the config loaders.
//!
//! Production reads the process environment; tests hand in a map so they
//! never have to mutate global state.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    overrides: Option<HashMap<String, String>>,
}

impl EnvSource {
    /// Reads from the process environment.
    pub fn process() -> Self {
        Self { overrides: None }
    }

    /// Reads only from `vars`; anything missing falls back to defaults.
    pub fn from_map<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn var(&self, key: &str) -> Option<String> {
        let raw = match &self.overrides {
            Some(map) => map.get(key).cloned(),
            None => env::var(key).ok(),
        };
        raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    pub fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        Ok(self.parse_optional(key)?.unwrap_or(default))
    }

    pub fn parse_optional<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.var(key)
            .map(|v| v.parse::<T>().context(format!("Failed to parse {}", key)))
            .transpose()
    }
}
