//! Areas reached by slug and by domain.

use portico_core::{App, Boot, BootDescriptor, BootUnit, Call, Callable, Dir, HttpRequest, Result};
use portico_http::{Area, AreaBoot, ErrorHandlerBoot, RoutingBoot, RoutingExt};
use std::fs;

#[derive(Default)]
struct BlogRoutes;

impl Boot for BlogRoutes {
    fn descriptor(&self) -> BootDescriptor {
        BootDescriptor::of::<Self>().depends_on::<RoutingBoot>()
    }

    fn boot(&self, app: &App) -> Result<()> {
        app.route_get(
            "post/{id}",
            Callable::new(|call: Call| async move {
                let id = call.request().and_then(|r| r.param("id").cloned()).unwrap_or_default();
                Ok(format!("post {}", id).into())
            }),
        )?
        .name("post");
        app.route_get("", Callable::from_fn(|_call| Ok("blog home".into())))?;
        Ok(())
    }
}

struct Blog;

impl Area for Blog {
    const KEY: &'static str = "blog";
    const SLUG: &'static str = "blog";

    fn boots() -> Vec<BootUnit> {
        vec![BootUnit::new(BlogRoutes)]
    }
}

struct Swiss;

impl Area for Swiss {
    const KEY: &'static str = "swiss";
    const SLUG: &'static str = "ignored";
    const DOMAIN: Option<&'static str> = Some("ch.localhost");

    fn boots() -> Vec<BootUnit> {
        vec![BootUnit::new(BlogRoutes)]
    }
}

fn root_app(dir: &tempfile::TempDir) -> App {
    let app = App::new("root");
    app.dir(Dir::new(dir.path(), "config", "config", 10));
    app.boot(RoutingBoot)
        .boot(ErrorHandlerBoot)
        .boot(AreaBoot::<Blog>::default())
        .boot(AreaBoot::<Swiss>::default());
    app
}

fn config_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("http.toml"), "hosts = [\"localhost\"]\n").unwrap();
    dir
}

#[tokio::test]
async fn slug_area_serves_nested_routes() {
    let dir = config_dir();
    let app = root_app(&dir);

    let res = app
        .handle(HttpRequest::from_uri("GET", "http://localhost/blog/post/5"))
        .await
        .unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body_string(), "post 5");

    let area = app.get::<AreaBoot<Blog>>().unwrap();
    assert!(area.is_routed());
    assert_eq!(area.url().unwrap(), "http://localhost/blog");
    assert_eq!(area.app().unwrap().router().unwrap().base_path(), "/blog/");
}

#[tokio::test]
async fn slug_area_home() {
    let dir = config_dir();
    let app = root_app(&dir);

    let res = app.handle(HttpRequest::from_uri("GET", "http://localhost/blog")).await.unwrap();
    assert_eq!(res.body_string(), "blog home");
}

#[tokio::test]
async fn unknown_nested_route_is_not_found() {
    let dir = config_dir();
    let app = root_app(&dir);

    let res = app
        .handle(
            HttpRequest::from_uri("GET", "http://localhost/blog/missing/page")
                .with_header("accept", "application/json"),
        )
        .await
        .unwrap();
    assert_eq!(res.status, 404);
    assert_eq!(res.json::<serde_json::Value>().unwrap()["message"], "404 | Not Found");
}

#[tokio::test]
async fn domain_area_ignores_slug() {
    let dir = config_dir();
    let app = root_app(&dir);

    let res = app.handle(HttpRequest::from_uri("GET", "http://ch.localhost/post/9")).await.unwrap();
    assert_eq!(res.body_string(), "post 9");

    let area = app.get::<AreaBoot<Swiss>>().unwrap();
    assert_eq!(area.url().unwrap(), "http://ch.localhost");
    assert_eq!(area.area_domain().as_deref(), Some("ch.localhost"));
}

#[tokio::test]
async fn root_routes_do_not_reach_domain_area() {
    let dir = config_dir();
    let app = root_app(&dir);

    let res = app.handle(HttpRequest::from_uri("GET", "http://localhost/post/9")).await.unwrap();
    assert_eq!(res.status, 404);
    assert_eq!(res.body_string(), "404 | Not Found");
}

#[tokio::test]
async fn area_config_overrides() {
    let dir = config_dir();
    fs::write(dir.path().join("blog.toml"), "slug = \"journal\"\n").unwrap();
    let app = root_app(&dir);

    let res = app
        .handle(HttpRequest::from_uri("GET", "http://localhost/journal/post/1"))
        .await
        .unwrap();
    assert_eq!(res.body_string(), "post 1");

    let missed = app
        .handle(HttpRequest::from_uri("GET", "http://localhost/blog/post/1"))
        .await
        .unwrap();
    assert_eq!(missed.status, 404);
}
