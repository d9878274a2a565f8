//! Installation of the default configuration files.

use portico_core::{Dir, Result};
use portico_log::info;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::fs;

const HTTP_TEMPLATE: &str = include_str!("../resources/config/http.toml");
const SESSION_TEMPLATE: &str = include_str!("../resources/config/session.toml");
const COOKIES_TEMPLATE: &str = include_str!("../resources/config/cookies.toml");

/// Config file name and template of every installed file.
pub const CONFIG_TEMPLATES: [(&str, &str); 3] = [
    ("http.toml", HTTP_TEMPLATE),
    ("session.toml", SESSION_TEMPLATE),
    ("cookies.toml", COOKIES_TEMPLATE),
];

/// A random 32 character alphanumeric key.
pub fn generate_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Write the config templates into `dir` unless `http.toml` is already
/// there. Existing files are never overwritten. Returns whether anything
/// was installed.
pub fn install_config(dir: &Dir) -> Result<bool> {
    if dir.file("http.toml").exists() {
        return Ok(false);
    }
    fs::create_dir_all(&dir.path)?;

    let key = generate_key();
    for (file, template) in CONFIG_TEMPLATES {
        let path = dir.file(file);
        if path.exists() {
            continue;
        }
        fs::write(&path, template.replace("{signature_key}", &key))?;
    }

    info!(target: "portico::install", "installed config into {}", dir.path.display());
    Ok(true)
}
