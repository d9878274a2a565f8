//! Sessions and cookies for Portico applications.
//!
//! ```ignore
//! use portico_session::{SessionFactory, SessionSettings, SessionMiddleware};
//!
//! let factory = SessionFactory::from_name("memory")?;
//! let session = Arc::new(factory.from_settings(&SessionSettings::default(), "/")?);
//! dispatcher.add(Arc::new(SessionMiddleware::new(session)), 6000);
//! ```

pub mod config;
pub mod cookies;
pub mod error;
pub mod factory;
pub mod middleware;
pub mod session;
pub mod store;
pub mod validation;

pub use config::{SessionConfig, SessionSettings};
pub use cookies::{
    Cookie, CookieDefaults, CookieEncrypter, CookieValues, CookiesMiddleware, CookiesProcessor,
    QueuedCookies, SameSite,
};
pub use error::{SessionError, SessionResult};
pub use factory::SessionFactory;
pub use middleware::{PREVIOUS_URI_KEY, PreviousUriSession, SessionMiddleware};
pub use session::Session;
pub use store::{MemorySessionStore, SessionData, SessionStore, generate_session_id};
pub use validation::{RemoteAddrValidation, SessionValidation, UserAgentValidation, Validations};
