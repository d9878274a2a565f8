// Request-level middleware installed by the boot units

pub mod method_override;
pub mod pre_routing;
pub mod routing;

pub use method_override::MethodOverride;
pub use pre_routing::{PreRouting, PreRouted};
pub use routing::Routing;

/// Priorities of the built-in middleware. Higher runs first.
pub mod priority {
    pub const COOKIES: i32 = 6100;
    pub const SESSION: i32 = 6000;
    pub const METHOD_OVERRIDE: i32 = 5100;
    pub const PRE_ROUTING: i32 = 5000;
    pub const ROUTING: i32 = 1000;
}
