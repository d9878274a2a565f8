//! Console commands for Portico applications.
//!
//! ```no_run
//! use portico_cli::Console;
//! use portico_core::App;
//!
//! let app = App::with_root("shop", ".");
//! std::process::exit(Console::new(app).run());
//! ```

pub mod console;
pub mod error;
pub mod route_list;

pub use console::Console;
pub use error::{CliError, CliResult};
pub use route_list::{RouteListCommand, table};
