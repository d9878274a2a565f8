// Session factory

use crate::config::{SessionConfig, SessionSettings};
use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::store::{MemorySessionStore, SessionStore};
use crate::validation::Validations;
use std::sync::Arc;

/// Creates sessions backed by one store.
#[derive(Clone)]
pub struct SessionFactory {
    store: Arc<dyn SessionStore>,
}

impl SessionFactory {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Factory for a configured store name.
    pub fn from_name(name: &str) -> SessionResult<Self> {
        match name {
            "memory" | "" => Ok(Self::new(MemorySessionStore::shared())),
            other => Err(SessionError::Config(format!("unknown session factory '{}'", other))),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn create(
        &self,
        name: impl Into<String>,
        config: SessionConfig,
        validations: Validations,
    ) -> Session {
        Session::new(name, config, self.store.clone(), validations)
    }

    /// Session described by `settings`. The cookie path falls back to
    /// `base_path` when the settings leave it unset.
    pub fn from_settings(
        &self,
        settings: &SessionSettings,
        base_path: &str,
    ) -> SessionResult<Session> {
        let mut config = settings.config.clone();
        if config.cookie_path.is_none() {
            config.cookie_path = Some(base_path.to_string());
        }
        let validations = Validations::from_names(config.validation.as_deref())?;
        Ok(self.create(settings.name.clone(), config, validations))
    }
}
