//! Cookie values, queued cookies and the processor that encrypts them.

mod cookie;
mod middleware;
mod processor;
mod queue;
mod values;

pub use cookie::{Cookie, CookieDefaults, SameSite};
pub use middleware::CookiesMiddleware;
pub use processor::{CookieEncrypter, CookiesProcessor};
pub use queue::QueuedCookies;
pub use values::CookieValues;
