//! Session data and the storage backends that keep it between requests.

use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use portico_log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Stored state of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Unique session identifier
    pub id: String,
    /// Session values
    pub data: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl SessionData {
    /// Create session data with the given ID and TTL.
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data: HashMap::new(),
            created_at: now,
            last_accessed_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
            user_agent: None,
            ip_address: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Get a value, `None` when missing or of another shape.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> SessionResult<()> {
        let value =
            serde_json::to_value(value).map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&String> {
        self.data.keys().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    pub fn extend(&mut self, ttl: Duration) {
        self.expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }
}

/// Session storage backend.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new session. It reaches the store on the first `save`.
    async fn create(&self, ttl: Duration) -> SessionResult<SessionData>;

    /// `Ok(None)` when the session is unknown or expired.
    async fn get(&self, session_id: &str) -> SessionResult<Option<SessionData>>;

    async fn save(&self, session: &SessionData) -> SessionResult<()>;

    async fn delete(&self, session_id: &str) -> SessionResult<()>;

    async fn exists(&self, session_id: &str) -> SessionResult<bool> {
        Ok(self.get(session_id).await?.is_some())
    }

    /// Number of live sessions.
    async fn count(&self) -> SessionResult<usize>;

    /// Remove expired sessions, returning how many were removed.
    async fn cleanup_expired(&self) -> SessionResult<usize>;
}

/// Generate a new unique session ID.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

static SHARED: Lazy<Arc<MemorySessionStore>> = Lazy::new(|| Arc::new(MemorySessionStore::new()));

/// In-process session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide store shared by every app that asks for the `memory`
    /// factory, so sessions outlive the per-request app.
    pub fn shared() -> Arc<MemorySessionStore> {
        SHARED.clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, ttl: Duration) -> SessionResult<SessionData> {
        let session = SessionData::new(generate_session_id(), ttl);
        trace!(target: "portico::session", "created session {}", session.id);
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> SessionResult<Option<SessionData>> {
        Ok(self
            .sessions
            .read()
            .get(session_id)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    async fn save(&self, session: &SessionData) -> SessionResult<()> {
        let mut sessions = self.sessions.write();
        sessions.retain(|_, s| !s.is_expired());
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        self.sessions.write().remove(session_id);
        Ok(())
    }

    async fn count(&self) -> SessionResult<usize> {
        Ok(self.sessions.read().values().filter(|s| !s.is_expired()).count())
    }

    async fn cleanup_expired(&self) -> SessionResult<usize> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_data_values() {
        let mut data = SessionData::new("id", Duration::from_secs(60));
        data.set("user_id", 42).unwrap();
        assert_eq!(data.get::<i64>("user_id"), Some(42));
        assert_eq!(data.get::<String>("user_id"), None);
        assert!(data.contains("user_id"));
        data.remove("user_id");
        assert!(data.keys().is_empty());
        assert!(!data.is_expired());
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemorySessionStore::new();
        let mut session = store.create(Duration::from_secs(60)).await.unwrap();
        assert!(!store.exists(&session.id).await.unwrap());

        session.set("k", "v").unwrap();
        store.save(&session).await.unwrap();
        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.get::<String>("k").as_deref(), Some("v"));

        store.delete(&session.id).await.unwrap();
        assert!(store.get(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_invisible_and_cleaned() {
        let store = MemorySessionStore::new();
        let live = store.create(Duration::from_secs(60)).await.unwrap();
        store.save(&live).await.unwrap();
        let mut stale = SessionData::new("stale", Duration::from_secs(60));
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store.save(&stale).await.unwrap();

        assert!(store.get("stale").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.exists(&live.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_prunes_expired_sessions() {
        let store = MemorySessionStore::new();
        let mut stale = SessionData::new("stale", Duration::from_secs(60));
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store.save(&stale).await.unwrap();
        assert_eq!(store.sessions.read().len(), 1);

        let fresh = store.create(Duration::from_secs(60)).await.unwrap();
        store.save(&fresh).await.unwrap();

        let sessions = store.sessions.read();
        assert_eq!(sessions.len(), 1);
        assert!(sessions.contains_key(&fresh.id));
    }

    #[tokio::test]
    async fn test_unsaved_sessions_are_not_stored() {
        let store = MemorySessionStore::new();
        for _ in 0..5 {
            store.create(Duration::from_secs(60)).await.unwrap();
        }
        assert!(store.sessions.read().is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(generate_session_id(), generate_session_id());
        assert_eq!(generate_session_id().len(), 32);
    }
}
