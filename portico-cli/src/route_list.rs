//! Route listing command
//!
//! Prints every registered route as a table, or the full definition of
//! the named routes as JSON.

use crate::error::CliResult;
use colored::Colorize;
use portico_core::{Route, Router};
use portico_log::debug;
use serde_json::{Map, Value, json};
use std::io::Write;

const HEADERS: [&str; 4] = ["Method", "Uri", "Name", "Handler"];

/// `route:list [--name <name>...]`
pub struct RouteListCommand<'a> {
    router: &'a Router,
}

impl<'a> RouteListCommand<'a> {
    pub fn new(router: &'a Router) -> Self {
        Self { router }
    }

    /// Write the listing to `out`. Unknown route names are reported on
    /// `err` and skipped.
    pub fn execute(
        &self,
        names: &[String],
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> CliResult<i32> {
        if names.is_empty() {
            let rows: Vec<[String; 4]> = self.router.routes().iter().map(row).collect();
            debug!(target: "portico::cli", "listing {} routes", rows.len());
            write!(out, "{}", table(&rows))?;
            return Ok(0);
        }

        let mut data = Map::new();
        for name in names {
            match self.details(name) {
                Some(details) => {
                    data.insert(name.clone(), details);
                }
                None => writeln!(err, "{}", format!("Route '{}' not found", name).red())?,
            }
        }
        writeln!(out, "{}", serde_json::to_string_pretty(&Value::Object(data))?)?;
        Ok(0)
    }

    /// JSON definition of the named route, with its generated urls.
    pub fn details(&self, name: &str) -> Option<Value> {
        let route = self.router.get_route(name)?;
        let mut details = definition(&route);

        // Routes with required parameters have no parameterless url.
        let urls = match self.router.url(name, &[]) {
            Ok(url) => json!({
                "url": url.get(),
                "translated": object(url.translated().iter()),
                "domained": object(url.domained().iter()),
            }),
            Err(_) => json!({ "url": null, "translated": {}, "domained": {} }),
        };
        details["urls"] = urls;
        Some(details)
    }
}

fn row(route: &Route) -> [String; 4] {
    [
        route.method().to_string(),
        route.uri().to_string(),
        route.name().unwrap_or_default().to_string(),
        route.handler().describe(),
    ]
}

fn definition(route: &Route) -> Value {
    json!({
        "method": route.method().to_string(),
        "uri": route.uri(),
        "name": route.name(),
        "handler": route.handler().describe(),
        "domain": route.domain(),
        "signed": route.is_signed(),
        "middleware": route.middleware().iter().map(|m| m.name()).collect::<Vec<_>>(),
        "parameters": object(route.parameters().iter()),
    })
}

fn object<'v, V: Into<Value> + Clone + 'v>(
    entries: impl Iterator<Item = (&'v String, &'v V)>,
) -> Value {
    Value::Object(
        entries
            .map(|(key, value)| (key.clone(), value.clone().into()))
            .collect(),
    )
}

/// Render rows below the headers as a bordered table.
pub fn table(rows: &[[String; 4]]) -> String {
    let mut widths = HEADERS.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = format!(
        "+{}+\n",
        widths.iter().map(|w| "-".repeat(w + 2)).collect::<Vec<_>>().join("+")
    );
    let line = |cells: &[String], header: bool| {
        let cells: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| {
                let padded = format!("{:width$}", cell, width = width);
                if header { padded.bold().to_string() } else { padded }
            })
            .collect();
        format!("| {} |\n", cells.join(" | "))
    };

    let mut output = border.clone();
    output.push_str(&line(&HEADERS.map(String::from), true));
    output.push_str(&border);
    for row in rows {
        output.push_str(&line(row, false));
    }
    if !rows.is_empty() {
        output.push_str(&border);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::{Callable, HandlerRef};
    use std::sync::Arc;

    fn router() -> Arc<Router> {
        colored::control::set_override(false);
        let router = Arc::new(Router::new());
        router.set_origin("https://example.com");
        router.set_base_path("/basepath");
        router.set_signature_key("a-random-32-character-secret-key");
        router.get("blog", HandlerRef::parse("Controller::method")).name("blog");
        router
            .get("blog/{id}", Callable::from_fn(|_call| Ok("post".into())))
            .name("blog.show")
            .signed(true);
        router
            .get("about", HandlerRef::parse("PagesController"))
            .name("about")
            .translate("de", "ueber-uns");
        router
    }

    fn run(router: &Router, names: &[&str]) -> (i32, String, String) {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = RouteListCommand::new(router).execute(&names, &mut out, &mut err).unwrap();
        (code, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn test_table() {
        let (code, out, err) = run(&router(), &[]);
        assert_eq!(code, 0);
        assert!(err.is_empty());

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[1].starts_with("| Method | Uri "));
        assert!(lines[3].contains("| GET    | blog "));
        assert!(lines[3].contains("Controller::method"));
        assert!(lines[4].contains("blog.show") && lines[4].contains("Closure"));
        assert!(lines.iter().all(|l| l.len() == lines[0].len()));
    }

    #[test]
    fn test_empty_table() {
        colored::control::set_override(false);
        let (code, out, _) = run(&Router::new(), &[]);
        assert_eq!(code, 0);
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_details() {
        let (code, out, err) = run(&router(), &["blog", "about"]);
        assert_eq!(code, 0);
        assert!(err.is_empty());

        let data: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(data["blog"]["method"], "GET");
        assert_eq!(data["blog"]["handler"], "Controller::method");
        assert_eq!(data["blog"]["signed"], false);
        assert_eq!(data["blog"]["urls"]["url"], "https://example.com/basepath/blog");
        assert_eq!(
            data["about"]["urls"]["translated"]["de"],
            "https://example.com/basepath/ueber-uns"
        );
        assert_eq!(data["about"]["urls"]["domained"], json!({}));
    }

    #[test]
    fn test_details_without_parameterless_url() {
        let details = RouteListCommand::new(&router()).details("blog.show").unwrap();
        assert_eq!(details["signed"], true);
        assert_eq!(details["urls"]["url"], Value::Null);
    }

    #[test]
    fn test_unknown_names_are_reported() {
        let (code, out, err) = run(&router(), &["blog", "missing"]);
        assert_eq!(code, 0);
        assert_eq!(err.trim(), "Route 'missing' not found");

        let data: Value = serde_json::from_str(&out).unwrap();
        assert!(data.get("missing").is_none());
        assert!(data.get("blog").is_some());
    }
}
