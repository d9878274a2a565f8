// Application kernel for the Portico bootstrap layer
// Container, boot scheduler, routing, middleware and the route-handler chain

pub mod app;
pub mod arguments;
pub mod boot;
pub mod container;
pub mod dirs;
pub mod emitter;
pub mod error;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod params;
pub mod route_handler;
pub mod routing;
pub mod server;
pub mod throwable;
pub mod url;

// Re-export commonly used types
pub use app::*;
pub use arguments::*;
pub use boot::*;
pub use container::*;
pub use dirs::*;
pub use emitter::*;
pub use error::{Error, Result};
pub use handler::*;
pub use self::http::*;
pub use middleware::*;
pub use params::*;
pub use route_handler::*;
pub use routing::*;
pub use server::*;
pub use throwable::*;
pub use self::url::{Url, UrlSigner};
