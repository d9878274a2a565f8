//! Boot units wiring HTTP handling into an [`App`](portico_core::App).

pub mod cookies;
pub mod error_handler;
pub mod http;
pub mod middleware;
pub mod requester_responser;
pub mod routing;
pub mod session;

pub use cookies::{CookiesBoot, CookiesSettings};
pub use error_handler::{ERROR_HANDLER_PRIORITY, ErrorHandlerBoot, ErrorResponder, status_message};
pub use http::{
    DomainSettings, HttpBoot, HttpSettings, RequestedHost, RouteHandlerKind, ValidHosts, allow_host,
};
pub use middleware::MiddlewareBoot;
pub use requester_responser::{RequesterExt, RequesterResponserBoot};
pub use routing::{DEFAULT_SIGNATURE_KEY, RoutingBoot};
pub use session::SessionBoot;
