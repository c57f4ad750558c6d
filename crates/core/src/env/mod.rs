use anyhow::Context;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

pub mod resolve;

pub use resolve::{key_prefix, resolve_prefixed, resolve_with_retry, KeySource, ResolvedKey};

/// Read-only view over the places configuration values can come from.
///
/// `var` covers the process environment (both the directly named variable and the
/// hosting platform's prefixed copy). `runtime_var` covers values injected at runtime
/// through a JSON config object rather than through the environment.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;

    fn runtime_var(&self, key: &str) -> Option<String>;

    fn keys(&self) -> Vec<String>;

    /// Re-read sources that can change after startup. No-op by default.
    fn refresh(&self) {}
}

#[derive(Debug, Default)]
pub struct ProcessEnv {
    runtime_config_path: Option<PathBuf>,
    runtime: RwLock<BTreeMap<String, String>>,
}

impl ProcessEnv {
    pub fn new(runtime_config_path: Option<PathBuf>) -> Self {
        let env = Self {
            runtime_config_path,
            runtime: RwLock::new(BTreeMap::new()),
        };
        env.refresh();
        env
    }

    fn load_runtime_config(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let Some(path) = &self.runtime_config_path else {
            return Ok(BTreeMap::new());
        };
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config {}", path.display()))?;
        parse_runtime_config(&text)
            .with_context(|| format!("invalid runtime config {}", path.display()))
    }
}

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn runtime_var(&self, key: &str) -> Option<String> {
        self.runtime
            .read()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    /// Keys that are not valid UTF-8 are left out.
    fn keys(&self) -> Vec<String> {
        std::env::vars_os()
            .filter_map(|(k, _)| k.into_string().ok())
            .collect()
    }

    fn refresh(&self) {
        match self.load_runtime_config() {
            Ok(map) => {
                if let Ok(mut guard) = self.runtime.write() {
                    *guard = map;
                }
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "runtime config not loaded");
            }
        }
    }
}

/// Only string values of the top-level object are kept.
pub fn parse_runtime_config(text: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let raw = serde_json::from_str::<BTreeMap<String, Value>>(text)
        .context("runtime config must be a JSON object")?;
    Ok(raw
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            _ => None,
        })
        .collect())
}

/// Fixed in-memory source.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
    runtime: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_runtime_var(mut self, key: &str, value: &str) -> Self {
        self.runtime.insert(key.to_string(), value.to_string());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn runtime_var(&self, key: &str) -> Option<String> {
        self.runtime.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }
}
