//! Session configuration.
//!
//! Mirrors the `session.toml` file:
//!
//! ```toml
//! name = "sess"
//! factory = "memory"
//! middlewares = ["session", "previous_uri"]
//!
//! [config]
//! max_lifetime = 1800
//! cookie_domain = ""
//! cookie_same_site = "Strict"
//! secure = true
//! http_only = true
//! ```

use crate::cookies::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cookie and lifetime settings of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds a session lives without being used
    pub max_lifetime: u64,
    /// Cookie path; defaults to the router base path when unset
    pub cookie_path: Option<String>,
    pub cookie_domain: String,
    pub cookie_same_site: SameSite,
    pub secure: bool,
    pub http_only: bool,
    /// Validation names (`remote_addr`, `user_agent`); `None` uses both
    pub validation: Option<Vec<String>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_lifetime: 1800,
            cookie_path: None,
            cookie_domain: String::new(),
            cookie_same_site: SameSite::Strict,
            secure: true,
            http_only: true,
            validation: None,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.max_lifetime)
    }

    pub fn cookie_path(&self) -> &str {
        self.cookie_path.as_deref().unwrap_or("/")
    }

    /// The session cookie carrying `id`.
    pub fn cookie(&self, name: &str, id: &str) -> Cookie {
        Cookie::new(name, id)
            .with_path(self.cookie_path())
            .with_domain(self.cookie_domain.clone())
            .with_max_age(self.max_lifetime as i64)
            .secure(self.secure)
            .http_only(self.http_only)
            .with_same_site(self.cookie_same_site)
    }
}

/// Contents of `session.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session cookie name
    pub name: String,
    /// Store factory; only `memory` is built in
    pub factory: String,
    pub config: SessionConfig,
    /// Middleware aliases added at the session priority
    pub middlewares: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            name: "sess".to_string(),
            factory: "memory".to_string(),
            config: SessionConfig::default(),
            middlewares: vec!["session".to_string(), "previous_uri".to_string()],
        }
    }
}
