use super::middleware::MiddlewareBoot;
use crate::middleware::priority;
use crate::uri::UriExt;
use portico_config::{ConfigBoot, ConfigExt};
use portico_core::{App, Boot, BootDescriptor, MiddlewareDispatcher, Result};
use portico_session::{CookieDefaults, CookieEncrypter, CookiesMiddleware, CookiesProcessor};
use serde::Deserialize;
use std::sync::Arc;

/// The `cookies` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CookiesSettings {
    pub middlewares: Vec<String>,
    /// Cookies never passed through the encrypter.
    pub whitelist: Vec<String>,
}

impl Default for CookiesSettings {
    fn default() -> Self {
        Self {
            middlewares: vec!["cookies".to_string()],
            whitelist: Vec::new(),
        }
    }
}

/// Registers the [`CookiesProcessor`] and the `cookies` middleware.
///
/// Cookie path, domain and the secure flag default to the base uri. An
/// `Arc<dyn CookieEncrypter>` in the app encrypts every cookie that is not
/// whitelisted.
#[derive(Default)]
pub struct CookiesBoot;

impl Boot for CookiesBoot {
    fn descriptor(&self) -> BootDescriptor {
        BootDescriptor::of::<Self>()
            .depends_on::<ConfigBoot>()
            .depends_on::<MiddlewareBoot>()
    }

    fn boot(&self, app: &App) -> Result<()> {
        let config = app.config()?;
        config.load_optional("cookies.toml", "cookies", &app.dirs().group("config"))?;
        let settings = if config.has("cookies") {
            config.get::<CookiesSettings>("cookies")?
        } else {
            CookiesSettings::default()
        };

        let mut processor = CookiesProcessor::new(CookieDefaults::from_base_uri(&app.base_uri()));
        if let Ok(encrypter) = app.get::<Arc<dyn CookieEncrypter>>() {
            processor = processor.with_encrypter((*encrypter).clone());
        }
        for name in &settings.whitelist {
            processor.whitelist(name.clone());
        }
        let processor = Arc::new(processor);
        app.set_arc(processor.clone());

        let dispatcher = app.get::<MiddlewareDispatcher>()?;
        dispatcher.alias("cookies", Arc::new(CookiesMiddleware::new(processor)), priority::COOKIES);
        for middleware in &settings.middlewares {
            dispatcher.add_ref(middleware.as_str().into(), Some(priority::COOKIES))?;
        }
        Ok(())
    }
}
