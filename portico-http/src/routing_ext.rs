// Routing helpers on the app

use portico_core::{App, GroupHandle, HandlerRef, Result, RouteGroup, RouteHandle, Router};
use std::sync::Arc;

/// Route registration on an app booted with
/// [`RoutingBoot`](crate::boot::RoutingBoot).
pub trait RoutingExt {
    fn router(&self) -> Result<Arc<Router>>;

    fn route(&self, method: &str, uri: &str, handler: impl Into<HandlerRef>) -> Result<RouteHandle>;

    fn route_get(&self, uri: &str, handler: impl Into<HandlerRef>) -> Result<RouteHandle> {
        self.route("GET", uri, handler)
    }

    fn route_post(&self, uri: &str, handler: impl Into<HandlerRef>) -> Result<RouteHandle> {
        self.route("POST", uri, handler)
    }

    fn route_group(&self, prefix: &str, routes: impl FnOnce(&RouteGroup)) -> Result<GroupHandle>;

    /// Url of the named route as a string.
    fn route_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String>;
}

impl RoutingExt for App {
    fn router(&self) -> Result<Arc<Router>> {
        self.get::<Router>()
    }

    fn route(
        &self,
        method: &str,
        uri: &str,
        handler: impl Into<HandlerRef>,
    ) -> Result<RouteHandle> {
        Ok(self.router()?.route(method, uri, handler))
    }

    fn route_group(&self, prefix: &str, routes: impl FnOnce(&RouteGroup)) -> Result<GroupHandle> {
        Ok(self.router()?.group(prefix, routes))
    }

    fn route_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String> {
        Ok(self.router()?.url(name, params)?.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::{Callable, Error};

    #[test]
    fn test_requires_router() {
        let app = App::new("test");
        assert!(matches!(app.router(), Err(Error::ProviderNotFound(_))));
    }

    #[test]
    fn test_register_and_url() {
        let app = App::new("test");
        app.set_arc(Arc::new(Router::new()));

        app.route_get("posts/{id}", Callable::from_fn(|_call| Ok("post".into())))
            .unwrap()
            .name("post");
        app.route_group("admin", |group| {
            group
                .post("users", Callable::from_fn(|_call| Ok("created".into())))
                .name("admin.users");
        })
        .unwrap();

        assert_eq!(app.route_url("post", &[("id", "3")]).unwrap(), "http://localhost/posts/3");
        assert_eq!(app.route_url("admin.users", &[]).unwrap(), "http://localhost/admin/users");
        assert!(app.route_url("missing", &[]).is_err());
    }
}
