// Console entry point

use crate::error::{CliError, CliResult};
use crate::route_list::RouteListCommand;
use clap::{Parser, Subcommand};
use colored::Colorize;
use portico_core::{App, Router};
use std::ffi::OsString;
use std::io::Write;

#[derive(Parser, Debug)]
#[command(name = "portico")]
#[command(about = "Portico application console")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all registered routes
    #[command(name = "route:list")]
    RouteList {
        /// The route names to list in detail
        #[arg(short = 'N', long = "name")]
        names: Vec<String>,
    },
}

/// Runs console commands against a booted application.
pub struct Console {
    app: App,
}

impl Console {
    pub fn new(app: App) -> Self {
        Self { app }
    }

    /// Parse `args` (program name first) and run the command, writing to
    /// `out` and `err`.
    pub fn run_with<I, T>(
        &self,
        args: I,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> CliResult<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args)?;
        if cli.no_color {
            colored::control::set_override(false);
        }

        match cli.command {
            Commands::RouteList { names } => {
                self.app.booting()?;
                let router = self.app.get::<Router>()?;
                RouteListCommand::new(&router).execute(&names, out, err)
            }
        }
    }

    /// Run with the process arguments and standard streams. Returns the
    /// exit code.
    pub fn run(&self) -> i32 {
        let (mut out, mut err) = (std::io::stdout(), std::io::stderr());
        match self.run_with(std::env::args_os(), &mut out, &mut err) {
            Ok(code) => code,
            Err(CliError::Usage(usage)) => {
                let code = usage.exit_code();
                let _ = usage.print();
                code
            }
            Err(e) => {
                let _ = writeln!(err, "{} {}", "error:".red().bold(), e);
                e.exit_code()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::HandlerRef;
    use std::sync::Arc;

    fn console() -> Console {
        let app = App::new("test");
        let router = Arc::new(Router::new());
        router.get("blog", HandlerRef::parse("Controller::method")).name("blog");
        app.set_arc(router);
        Console::new(app)
    }

    fn run(args: &[&str]) -> (CliResult<i32>, String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = console().run_with(args.iter().copied(), &mut out, &mut err);
        (result, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn test_route_list() {
        let (result, out, _) = run(&["portico", "route:list", "--no-color"]);
        assert_eq!(result.unwrap(), 0);
        assert!(out.contains("Controller::method"));
    }

    #[test]
    fn test_route_list_names() {
        let (result, out, err) =
            run(&["portico", "route:list", "--name", "blog", "-N", "nope", "--no-color"]);
        assert_eq!(result.unwrap(), 0);
        assert!(out.contains("\"blog\""));
        assert!(err.contains("Route 'nope' not found"));
    }

    #[test]
    fn test_unknown_command() {
        let (result, _, _) = run(&["portico", "cache:clear"]);
        let err = result.unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_requires_router() {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let console = Console::new(App::new("bare"));
        let result = console.run_with(["portico", "route:list"], &mut out, &mut err);
        assert!(matches!(
            result,
            Err(CliError::App(portico_core::Error::ProviderNotFound(_)))
        ));
    }
}
