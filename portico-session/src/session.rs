//! The session of the current request.

use crate::config::SessionConfig;
use crate::cookies::Cookie;
use crate::error::{SessionError, SessionResult};
use crate::store::{SessionData, SessionStore};
use crate::validation::Validations;
use parking_lot::Mutex;
use portico_core::HttpRequest;
use portico_log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Live handle on one session.
///
/// The handle is created unstarted. [`Session::start`] loads the session
/// named by the request cookie, or creates a fresh one, and validates it
/// against the request. Values are read and written in memory and reach
/// the store on [`Session::save`].
pub struct Session {
    name: String,
    config: SessionConfig,
    store: Arc<dyn SessionStore>,
    validations: Validations,
    data: Mutex<Option<SessionData>>,
}

impl Session {
    pub fn new(
        name: impl Into<String>,
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        validations: Validations,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            store,
            validations,
            data: Mutex::new(None),
        }
    }

    /// Cookie name of the session.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn validations(&self) -> &Validations {
        &self.validations
    }

    /// Start the session `id`, or a new one when `id` is `None`, unknown
    /// or expired. An existing session whose validation fails is an error
    /// and leaves the handle unstarted.
    pub async fn start(&self, id: Option<&str>, request: &HttpRequest) -> SessionResult<()> {
        let existing = match id.filter(|id| !id.is_empty()) {
            Some(id) => self.store.get(id).await?,
            None => None,
        };

        let data = match existing {
            Some(mut data) => {
                if let Err(e) = self.validations.validate(&data, request) {
                    *self.data.lock() = None;
                    return Err(e);
                }
                data.touch();
                data.extend(self.config.ttl());
                trace!(target: "portico::session", "resumed session {}", data.id);
                data
            }
            None => self.fresh(request).await?,
        };

        *self.data.lock() = Some(data);
        Ok(())
    }

    async fn fresh(&self, request: &HttpRequest) -> SessionResult<SessionData> {
        let mut data = self.store.create(self.config.ttl()).await?;
        self.validations.stamp(&mut data, request)?;
        if let Some(agent) = request.header("user-agent") {
            data.user_agent = Some(agent.to_string());
        }
        data.ip_address = request.remote_addr.clone();
        debug!(target: "portico::session", "started session {}", data.id);
        Ok(data)
    }

    pub fn is_started(&self) -> bool {
        self.data.lock().is_some()
    }

    pub fn id(&self) -> Option<String> {
        self.data.lock().as_ref().map(|d| d.id.clone())
    }

    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data.lock().as_ref().and_then(|d| d.get(key))
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.lock().as_ref().is_some_and(|d| d.contains(key))
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> SessionResult<()> {
        self.data.lock().as_mut().ok_or(SessionError::NotStarted)?.set(key, value)
    }

    pub fn delete(&self, key: &str) -> Option<serde_json::Value> {
        self.data.lock().as_mut().and_then(|d| d.remove(key))
    }

    /// Snapshot of the session state.
    pub fn data(&self) -> Option<SessionData> {
        self.data.lock().clone()
    }

    /// Write the session to the store. Unstarted sessions are not written.
    pub async fn save(&self) -> SessionResult<()> {
        let Some(data) = self.data() else {
            return Ok(());
        };
        self.store.save(&data).await
    }

    /// Move the session to a new id, keeping its values.
    pub async fn regenerate(&self) -> SessionResult<()> {
        let Some(mut data) = self.data() else {
            return Err(SessionError::NotStarted);
        };
        let old_id = data.id.clone();
        let fresh = self.store.create(self.config.ttl()).await?;
        data.id = fresh.id;
        data.extend(self.config.ttl());
        self.store.save(&data).await?;
        self.store.delete(&old_id).await?;

        debug!(target: "portico::session", "regenerated session {} as {}", old_id, data.id);
        *self.data.lock() = Some(data);
        Ok(())
    }

    /// Delete the session from the store and unstart the handle.
    pub async fn destroy(&self) -> SessionResult<()> {
        let data = self.data.lock().take();
        if let Some(data) = data {
            self.store.delete(&data.id).await?;
        }
        Ok(())
    }

    /// Cookie carrying the session id, or an expired cookie once the
    /// session is destroyed.
    pub fn cookie(&self) -> Cookie {
        match self.id() {
            Some(id) => self.config.cookie(&self.name, &id),
            None => Cookie::expired(self.name.clone()).with_path(self.config.cookie_path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;

    fn session(store: Arc<MemorySessionStore>) -> Session {
        Session::new("sess", SessionConfig::default(), store, Validations::standard())
    }

    fn client(agent: &str) -> HttpRequest {
        HttpRequest::new("GET", "/").with_remote_addr("10.0.0.1").with_header("user-agent", agent)
    }

    #[tokio::test]
    async fn test_values_survive_save_and_restart() {
        let store = Arc::new(MemorySessionStore::new());
        let first = session(store.clone());
        first.start(None, &client("curl")).await.unwrap();
        first.set("user", "ada").unwrap();
        first.save().await.unwrap();
        let id = first.id().unwrap();

        let second = session(store);
        second.start(Some(&id), &client("curl")).await.unwrap();
        assert_eq!(second.id(), Some(id));
        assert_eq!(second.get::<String>("user").as_deref(), Some("ada"));
    }

    #[tokio::test]
    async fn test_unknown_id_starts_fresh() {
        let session = session(Arc::new(MemorySessionStore::new()));
        session.start(Some("missing"), &client("curl")).await.unwrap();
        assert!(session.is_started());
        assert_ne!(session.id().as_deref(), Some("missing"));
    }

    #[tokio::test]
    async fn test_validation_failure() {
        let store = Arc::new(MemorySessionStore::new());
        let first = session(store.clone());
        first.start(None, &client("curl")).await.unwrap();
        first.save().await.unwrap();
        let id = first.id().unwrap();

        let second = session(store);
        let err = second.start(Some(&id), &client("firefox")).await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        assert!(!second.is_started());
    }

    #[tokio::test]
    async fn test_set_requires_start() {
        let session = session(Arc::new(MemorySessionStore::new()));
        assert!(matches!(session.set("k", 1), Err(SessionError::NotStarted)));
        assert!(session.save().await.is_ok());
    }

    #[tokio::test]
    async fn test_regenerate_and_destroy() {
        let store = Arc::new(MemorySessionStore::new());
        let session = session(store.clone());
        session.start(None, &client("curl")).await.unwrap();
        session.set("k", 1).unwrap();
        let old = session.id().unwrap();

        session.regenerate().await.unwrap();
        let new = session.id().unwrap();
        assert_ne!(old, new);
        assert!(!store.exists(&old).await.unwrap());
        assert_eq!(store.get(&new).await.unwrap().unwrap().get::<i32>("k"), Some(1));

        session.destroy().await.unwrap();
        assert!(!session.is_started());
        assert!(!store.exists(&new).await.unwrap());
        assert!(session.cookie().to_header().contains("Max-Age=0"));
    }
}
