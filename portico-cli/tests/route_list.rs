//! `route:list` against a booted application.

use portico_cli::Console;
use portico_core::{App, Callable, Dir};
use portico_http::{RoutingBoot, RoutingExt};
use serde_json::Value;
use std::fs;

fn app() -> (tempfile::TempDir, App) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("http.toml"),
        r#"signature_key = "0123456789abcdef0123456789abcdef"
base_path = "/shop"

[[domains]]
key = "ch"
domain = "shop.ch"
"#,
    )
    .unwrap();

    let app = App::new("shop");
    app.dir(Dir::new(dir.path(), "config", "config", 10));
    app.boot(RoutingBoot);
    app.booting().unwrap();

    app.route_get("products", "ProductController::index").unwrap().name("products");
    app.route_get("kontakt", Callable::from_fn(|_call| Ok("kontakt".into())))
        .unwrap()
        .name("contact")
        .domain("ch");
    (dir, app)
}

fn run(app: App, args: &[&str]) -> (i32, String, String) {
    let (mut out, mut err) = (Vec::new(), Vec::new());
    let code = Console::new(app).run_with(args.iter().copied(), &mut out, &mut err).unwrap();
    (code, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
}

#[test]
fn lists_routes_as_table() {
    let (_dir, app) = app();
    let (code, out, _) = run(app, &["portico", "route:list", "--no-color"]);
    assert_eq!(code, 0);
    assert!(out.contains("| Method | Uri "));
    assert!(out.contains("ProductController::index"));
    assert!(out.contains("contact"));
}

#[test]
fn details_include_domain_urls() {
    let (_dir, app) = app();
    let args = ["portico", "route:list", "--name", "products", "--name", "contact"];
    let (code, out, err) = run(app, &args);
    assert_eq!(code, 0);
    assert!(err.is_empty());

    let data: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(data["products"]["uri"], "products");
    assert_eq!(data["products"]["urls"]["url"], "http://localhost/shop/products");
    assert_eq!(data["contact"]["domain"], "ch");
    assert_eq!(data["contact"]["urls"]["domained"]["shop.ch"], "http://shop.ch/kontakt");
}
