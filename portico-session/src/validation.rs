// Session validation
//
// A validation stamps a fingerprint of the client into a new session and
// rejects later requests whose fingerprint differs.

use crate::error::{SessionError, SessionResult};
use crate::store::SessionData;
use portico_core::HttpRequest;
use std::sync::Arc;

const STAMP_PREFIX: &str = "_validation.";

pub trait SessionValidation: Send + Sync {
    fn name(&self) -> &str;

    /// Client fingerprint of `request`.
    fn fingerprint(&self, request: &HttpRequest) -> String;
}

/// Binds the session to the client address.
pub struct RemoteAddrValidation;

impl SessionValidation for RemoteAddrValidation {
    fn name(&self) -> &str {
        "remote_addr"
    }

    fn fingerprint(&self, request: &HttpRequest) -> String {
        request.remote_addr.clone().unwrap_or_default()
    }
}

/// Binds the session to the client user agent.
pub struct UserAgentValidation;

impl SessionValidation for UserAgentValidation {
    fn name(&self) -> &str {
        "user_agent"
    }

    fn fingerprint(&self, request: &HttpRequest) -> String {
        request.header("user-agent").unwrap_or_default().to_string()
    }
}

/// All validations a session runs.
#[derive(Clone, Default)]
pub struct Validations {
    validations: Vec<Arc<dyn SessionValidation>>,
}

impl Validations {
    pub fn none() -> Self {
        Self::default()
    }

    /// Remote address and user agent.
    pub fn standard() -> Self {
        Self::none().with(RemoteAddrValidation).with(UserAgentValidation)
    }

    /// Validations named in configuration; `None` gives [`Validations::standard`].
    pub fn from_names(names: Option<&[String]>) -> SessionResult<Self> {
        let Some(names) = names else {
            return Ok(Self::standard());
        };
        names.iter().try_fold(Self::none(), |validations, name| match name.as_str() {
            "remote_addr" => Ok(validations.with(RemoteAddrValidation)),
            "user_agent" => Ok(validations.with(UserAgentValidation)),
            other => Err(SessionError::Config(format!("unknown session validation '{}'", other))),
        })
    }

    pub fn with(mut self, validation: impl SessionValidation + 'static) -> Self {
        self.validations.push(Arc::new(validation));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.validations.iter().map(|v| v.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.validations.is_empty()
    }

    /// Record the fingerprints of `request` in a new session.
    pub fn stamp(&self, session: &mut SessionData, request: &HttpRequest) -> SessionResult<()> {
        for validation in &self.validations {
            let key = format!("{}{}", STAMP_PREFIX, validation.name());
            session.set(&key, validation.fingerprint(request))?;
        }
        Ok(())
    }

    /// Check `request` against the fingerprints stored in `session`.
    /// Sessions stamped before a validation was configured pass it.
    pub fn validate(&self, session: &SessionData, request: &HttpRequest) -> SessionResult<()> {
        for validation in &self.validations {
            let key = format!("{}{}", STAMP_PREFIX, validation.name());
            if let Some(stamp) = session.get::<String>(&key)
                && stamp != validation.fingerprint(request)
            {
                return Err(SessionError::Validation(format!("{} changed", validation.name())));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(addr: &str, agent: &str) -> HttpRequest {
        HttpRequest::new("GET", "/").with_remote_addr(addr).with_header("user-agent", agent)
    }

    #[test]
    fn test_standard_validation() {
        let validations = Validations::standard();
        let mut session = SessionData::new("id", Duration::from_secs(60));
        validations.stamp(&mut session, &client("10.0.0.1", "curl")).unwrap();

        assert!(validations.validate(&session, &client("10.0.0.1", "curl")).is_ok());
        let err = validations.validate(&session, &client("10.0.0.2", "curl")).unwrap_err();
        assert!(matches!(err, SessionError::Validation(ref msg) if msg.contains("remote_addr")));
        assert!(validations.validate(&session, &client("10.0.0.1", "firefox")).is_err());
    }

    #[test]
    fn test_from_names() {
        assert_eq!(
            Validations::from_names(None).unwrap().names(),
            vec!["remote_addr", "user_agent"]
        );
        let names = vec!["user_agent".to_string()];
        assert_eq!(Validations::from_names(Some(&names)).unwrap().names(), vec!["user_agent"]);
        assert!(Validations::from_names(Some(&[])).unwrap().is_empty());
        assert!(Validations::from_names(Some(&["bogus".to_string()])).is_err());
    }

    #[test]
    fn test_unstamped_sessions_pass() {
        let session = SessionData::new("id", Duration::from_secs(60));
        assert!(Validations::standard().validate(&session, &client("1.1.1.1", "x")).is_ok());
    }
}
