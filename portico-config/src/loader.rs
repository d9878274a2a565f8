// Configuration file loaders

use crate::{ConfigError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }

    /// Format of `path`, judged by its extension.
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::Parse(format!("no file extension: {}", path.display())))?;

        Self::from_extension(ext)
            .ok_or_else(|| ConfigError::Parse(format!("unsupported format: {}", ext)))
    }
}

/// Reads one configuration file into a JSON tree.
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    pub fn auto(path: &Path) -> Result<Self> {
        Ok(Self::new(FileFormat::detect(path)?))
    }

    /// Load `path`; a missing file is reported as [`ConfigError::NotFound`].
    pub fn load_file(&self, path: &Path) -> Result<Value> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        self.parse(&content)
    }

    pub fn parse(&self, content: &str) -> Result<Value> {
        match self.format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::Parse(format!("JSON parse error: {}", e))),
            FileFormat::Toml => {
                let value: toml::Value = toml::from_str(content)
                    .map_err(|e| ConfigError::Parse(format!("TOML parse error: {}", e)))?;
                serde_json::to_value(value).map_err(|e| ConfigError::Serialization(e.to_string()))
            }
            FileFormat::Env => Ok(parse_env(content)),
        }
    }
}

fn parse_env(content: &str) -> Value {
    let map = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), Value::String(value.to_string()))
        })
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_tables() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let value = loader
            .parse(
                r#"
                hosts = ["", "localhost"]

                [config]
                max_lifetime = 3600
                "#,
            )
            .unwrap();

        assert_eq!(value["hosts"][1], "localhost");
        assert_eq!(value["config"]["max_lifetime"], 3600);
    }

    #[test]
    fn test_parse_env_lines() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let value = loader.parse("# comment\nKEY=value\nQUOTED=\"a b\"\n").unwrap();
        assert_eq!(value["KEY"], "value");
        assert_eq!(value["QUOTED"], "a b");
    }

    #[test]
    fn test_missing_file() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let err = loader.load_file(Path::new("/nonexistent/http.toml")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::detect(Path::new("a/http.toml")).unwrap(), FileFormat::Toml);
        assert_eq!(FileFormat::from_extension("JSON"), Some(FileFormat::Json));
        assert!(FileFormat::detect(Path::new("a/http.yaml")).is_err());
    }
}
