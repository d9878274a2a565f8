// Configuration management for Portico

pub mod boot;
pub mod env;
pub mod error;
pub mod loader;

pub use boot::{ConfigBoot, ConfigExt};
pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};

use parking_lot::RwLock;
use portico_core::Dir;
use portico_log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Main configuration manager
///
/// Values are stored as JSON trees under a top-level key (usually the name
/// of the file they came from) and addressed with dotted keys such as
/// `session.config.max_lifetime`.
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// Load environment variables as top-level string keys
    pub fn load_env(&self) {
        let vars = EnvLoader::new(self.env_prefix.clone()).load();
        let mut config = self.config.write();
        for (key, value) in vars {
            config.insert(key, Value::String(value));
        }
    }

    /// Load a `.env` file into the process environment, then the environment
    /// into the manager. A missing default `.env` is ignored.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::Parse(e.to_string()))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        self.load_env();
        Ok(())
    }

    /// Load one file under `key`, merging into what is already there.
    pub fn load_file(&self, path: &Path, key: &str) -> Result<()> {
        let data = ConfigLoader::auto(path)?.load_file(path)?;
        self.merge_value(key, data);
        Ok(())
    }

    /// Load `file` from every dir, lowest priority first, so that keys from
    /// higher priority dirs win. Fails with [`ConfigError::NotFound`] when no
    /// dir has the file.
    pub fn load(&self, file: &str, key: &str, dirs: &[Dir]) -> Result<()> {
        let mut ordered: Vec<&Dir> = dirs.iter().collect();
        ordered.sort_by_key(|d| d.priority);

        let mut merged: Option<Value> = None;
        for dir in ordered {
            let path = dir.file(file);
            let data = match ConfigLoader::auto(&path)?.load_file(&path) {
                Ok(data) => data,
                Err(ConfigError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            debug!(target: "portico::config", "loaded {}", path.display());
            match merged.as_mut() {
                Some(target) => deep_merge(target, data),
                None => merged = Some(data),
            }
        }

        let data = merged.ok_or_else(|| ConfigError::NotFound(file.to_string()))?;
        self.merge_value(key, data);
        Ok(())
    }

    /// Like [`ConfigManager::load`], returning `false` instead of failing
    /// when no dir has the file.
    pub fn load_optional(&self, file: &str, key: &str, dirs: &[Dir]) -> Result<bool> {
        match self.load(file, key, dirs) {
            Ok(()) => Ok(true),
            Err(ConfigError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Set a value at a dotted key, creating intermediate tables.
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value =
            serde_json::to_value(value).map_err(|e| ConfigError::Serialization(e.to_string()))?;
        let (root, rest) = split_key(key);

        let mut config = self.config.write();
        let slot = config.entry(root.to_string()).or_insert(Value::Null);
        *descend_mut(slot, rest) = value;
        Ok(())
    }

    /// Deep-merge `value` into the tree at `key`.
    pub fn merge_value(&self, key: &str, value: Value) {
        let (root, rest) = split_key(key);
        let mut config = self.config.write();
        let slot = config.entry(root.to_string()).or_insert(Value::Null);
        deep_merge(descend_mut(slot, rest), value);
    }

    /// Raw value at a dotted key.
    pub fn value(&self, key: &str) -> Option<Value> {
        let (root, rest) = split_key(key);
        let config = self.config.read();
        let mut current = config.get(root)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.value(key).ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;
        serde_json::from_value(value)
            .map_err(|e| ConfigError::Deserialize(format!("{}: {}", key, e)))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// `None` when the key is missing or holds another type.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).ok()
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Top-level keys
    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Deep-merge every entry of `other` into this manager.
    pub fn merge(&self, other: &ConfigManager) {
        let entries: Vec<(String, Value)> = other
            .config
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in entries {
            self.merge_value(&key, value);
        }
    }
}

fn split_key(key: &str) -> (&str, Vec<&str>) {
    let mut parts = key.split('.').filter(|p| !p.is_empty());
    let root = parts.next().unwrap_or_default();
    (root, parts.collect())
}

fn descend_mut<'a>(mut current: &'a mut Value, path: Vec<&str>) -> &'a mut Value {
    for segment in path {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = &mut current[segment];
    }
    current
}

/// Merge `source` into `target`; tables merge key by key, anything else
/// replaces.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
