// Configuration boot unit

use crate::ConfigManager;
use portico_core::{App, Boot, Result};
use portico_log::debug;
use std::sync::Arc;

/// Registers the [`ConfigManager`] and loads the optional `app.toml`
/// (`debug`, `environment`) from the `config` dirs.
#[derive(Default)]
pub struct ConfigBoot;

impl Boot for ConfigBoot {
    fn boot(&self, app: &App) -> Result<()> {
        if !app.has::<ConfigManager>() {
            app.set(ConfigManager::new());
        }
        let config = app.get::<ConfigManager>()?;

        if !config.load_optional("app.toml", "app", &app.dirs().group("config"))? {
            debug!(target: "portico::config", "no app.toml for {}, using defaults", app.name());
        }
        if let Some(environment) = config.get_opt::<String>("app.environment") {
            app.set_environment(environment);
        }
        Ok(())
    }
}

/// Configuration access on the app.
pub trait ConfigExt {
    fn config(&self) -> Result<Arc<ConfigManager>>;

    /// `app.debug`, false when unset.
    fn is_debug(&self) -> bool;
}

impl ConfigExt for App {
    fn config(&self) -> Result<Arc<ConfigManager>> {
        self.get::<ConfigManager>()
    }

    fn is_debug(&self) -> bool {
        self.config()
            .map(|c| c.get_or("app.debug", false))
            .unwrap_or(false)
    }
}
