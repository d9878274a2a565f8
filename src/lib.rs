// Portico - HTTP application bootstrap layer
//
// An application kernel wired to routing, middleware, error handling,
// sessions, cookies and areas through boot units.

// Re-export core functionality
pub use portico_core::*;

// Re-export the boot units and their helpers
pub use portico_http::{
    AreaBoot, CookiesBoot, ErrorHandlerBoot, HttpBoot, MiddlewareBoot, RequesterExt,
    RequesterResponserBoot, RoutingBoot, RoutingExt, SessionBoot, UriExt,
};

pub use portico_config;
pub use portico_http;
pub use portico_log;
pub use portico_session;

#[cfg(feature = "cli")]
pub use portico_cli;

// Re-export commonly used external crates
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

/// Prelude for common imports
pub mod prelude {
    pub use portico_config::{ConfigBoot, ConfigExt};
    pub use portico_core::{
        App, Boot, BootDescriptor, Call, Callable, Dir, Error, HttpRequest, HttpResponse,
        Middleware, Next, Result, Router, Server,
    };
    pub use portico_http::{
        Area, AreaBoot, CookiesBoot, ErrorHandlerBoot, HttpBoot, MiddlewareBoot, RequesterExt,
        RequesterResponserBoot, RoutingBoot, RoutingExt, SessionBoot, UriExt,
    };
    pub use portico_log::{debug, error, info, trace, warn};

    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
}
