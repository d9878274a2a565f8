//! Base, current and previous uris of the running request.
//!
//! The uris are computed from the current request each time they are asked
//! for, so a request replaced by a filter or by an area is always reflected.

use portico_config::ConfigExt;
use portico_core::{App, Router};
use portico_session::{PREVIOUS_URI_KEY, Session};

/// The uri of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUri {
    pub uri: String,
    /// Whether the request targets the base uri itself.
    pub is_home: bool,
}

/// Uri helpers on the app.
pub trait UriExt {
    /// Path prefix routes live under, `/` or `/<prefix>/`.
    fn base_path(&self) -> String;

    /// Request origin followed by the base path.
    fn base_uri(&self) -> String;

    fn current_uri(&self) -> CurrentUri;

    /// Last page read in this session, the base uri without one.
    fn previous_uri(&self) -> String;
}

pub(crate) fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

impl UriExt for App {
    fn base_path(&self) -> String {
        if let Ok(router) = self.get::<Router>() {
            return router.base_path();
        }
        let configured = self
            .config()
            .ok()
            .and_then(|c| c.get_opt::<String>("http.base_path"))
            .unwrap_or_default();
        normalize_base_path(&configured)
    }

    fn base_uri(&self) -> String {
        let origin = self
            .request()
            .map(|r| r.origin())
            .unwrap_or_else(|| "http://localhost".to_string());
        format!("{}{}", origin, self.base_path())
    }

    fn current_uri(&self) -> CurrentUri {
        let base = self.base_uri();
        let uri = match self.request() {
            Some(request) if request.query.is_empty() => {
                format!("{}{}", request.origin(), request.path)
            }
            Some(request) => format!("{}{}?{}", request.origin(), request.path, request.query),
            None => base.clone(),
        };
        let is_home = uri.split('?').next().is_some_and(|path| {
            path.trim_end_matches('/') == base.trim_end_matches('/')
        });
        CurrentUri { uri, is_home }
    }

    fn previous_uri(&self) -> String {
        self.get::<Session>()
            .ok()
            .and_then(|session| session.get::<String>(PREVIOUS_URI_KEY))
            .unwrap_or_else(|| self.base_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::HttpRequest;
    use std::sync::Arc;

    #[test]
    fn test_uris_follow_the_request() {
        let app = App::new("test");
        app.set_request(HttpRequest::from_uri("GET", "https://example.com/blog/5?page=2"));

        assert_eq!(app.base_path(), "/");
        assert_eq!(app.base_uri(), "https://example.com/");

        let current = app.current_uri();
        assert_eq!(current.uri, "https://example.com/blog/5?page=2");
        assert!(!current.is_home);
        assert_eq!(app.previous_uri(), "https://example.com/");
    }

    #[test]
    fn test_home_under_router_base_path() {
        let app = App::new("test");
        let router = Arc::new(Router::new());
        router.set_base_path("private");
        app.set_arc(router);
        app.set_request(HttpRequest::from_uri("GET", "http://localhost/private"));

        assert_eq!(app.base_uri(), "http://localhost/private/");
        assert!(app.current_uri().is_home);
    }

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path(""), "/");
        assert_eq!(normalize_base_path("/admin"), "/admin/");
        assert_eq!(normalize_base_path("a/b/"), "/a/b/");
    }
}
