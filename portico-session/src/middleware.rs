//! Session middleware.

use crate::cookies::CookieValues;
use crate::session::Session;
use async_trait::async_trait;
use portico_core::{HttpRequest, HttpResponse, Middleware, Next, Result};
use std::sync::Arc;

/// Session key holding the last page the client read.
pub const PREVIOUS_URI_KEY: &str = "_previous_uri";

/// Starts the session from the request cookie, makes it available to inner
/// layers through the request extensions, saves it and sets its cookie.
pub struct SessionMiddleware {
    session: Arc<Session>,
}

impl SessionMiddleware {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse> {
        let cookies = CookieValues::from_request(&req);
        self.session.start(cookies.get(self.session.name()), &req).await?;
        req.extensions.insert(self.session.clone());

        let result = next(req).await;
        self.session.save().await?;

        let response = result?;
        Ok(response.with_cookie(self.session.cookie().to_header()))
    }

    fn name(&self) -> &str {
        "session"
    }
}

/// Remembers the uri of every page read so later requests can go back to it.
///
/// Only reading (`GET`/`HEAD`) requests count, and neither prefetches nor
/// ajax calls do.
pub struct PreviousUriSession {
    session: Arc<Session>,
}

impl PreviousUriSession {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

fn is_prefetch(req: &HttpRequest) -> bool {
    ["purpose", "sec-purpose", "x-purpose", "x-moz"]
        .iter()
        .filter_map(|header| req.header(header))
        .any(|value| value.to_ascii_lowercase().contains("prefetch"))
}

#[async_trait]
impl Middleware for PreviousUriSession {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse> {
        let remember =
            matches!(req.method.as_str(), "GET" | "HEAD") && !is_prefetch(&req) && !req.is_ajax();
        let uri = req.uri();

        let response = next(req).await?;
        if remember && self.session.is_started() {
            self.session.set(PREVIOUS_URI_KEY, uri)?;
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        "previous_uri"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::store::MemorySessionStore;
    use crate::validation::Validations;
    use portico_core::{Error, MiddlewareDispatcher, handler_fn};

    fn session() -> Arc<Session> {
        Arc::new(Session::new(
            "sess",
            SessionConfig::default(),
            Arc::new(MemorySessionStore::new()),
            Validations::standard(),
        ))
    }

    fn dispatcher(session: &Arc<Session>) -> MiddlewareDispatcher {
        let dispatcher = MiddlewareDispatcher::new(handler_fn(|req: HttpRequest| async move {
            let session = req
                .extensions
                .get::<Arc<Session>>()
                .cloned()
                .ok_or_else(|| Error::Internal("no session".into()))?;
            let visits = session.get::<u32>("visits").unwrap_or(0) + 1;
            session.set("visits", visits)?;
            Ok(HttpResponse::ok().with_text(visits.to_string()))
        }));
        dispatcher.add(Arc::new(SessionMiddleware::new(session.clone())), 6000);
        dispatcher.add(Arc::new(PreviousUriSession::new(session.clone())), 5900);
        dispatcher
    }

    #[tokio::test]
    async fn test_session_cookie_round_trip() {
        let first = session();
        let res = dispatcher(&first)
            .handle(HttpRequest::new("GET", "/a").with_remote_addr("10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(res.body_string(), "1");
        let id = first.id().unwrap();
        assert!(res.cookies[0].starts_with(&format!("sess={};", id)));

        let second = Arc::new(Session::new(
            "sess",
            SessionConfig::default(),
            first.store().clone(),
            Validations::standard(),
        ));
        let res = dispatcher(&second)
            .handle(
                HttpRequest::new("GET", "/b")
                    .with_remote_addr("10.0.0.1")
                    .with_header("cookie", format!("sess={}", id)),
            )
            .await
            .unwrap();
        assert_eq!(res.body_string(), "2");
        assert_eq!(second.get::<String>(PREVIOUS_URI_KEY).as_deref(), Some("/b"));
    }

    #[tokio::test]
    async fn test_validation_error_propagates() {
        let first = session();
        dispatcher(&first)
            .handle(HttpRequest::new("GET", "/").with_remote_addr("10.0.0.1"))
            .await
            .unwrap();
        let id = first.id().unwrap();

        let err = dispatcher(&first)
            .handle(
                HttpRequest::new("GET", "/")
                    .with_remote_addr("10.9.9.9")
                    .with_header("cookie", format!("sess={}", id)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionValidation(_)));
    }

    #[tokio::test]
    async fn test_previous_uri_skips_ajax_and_posts() {
        let session = session();
        let dispatcher = dispatcher(&session);

        dispatcher.handle(HttpRequest::new("GET", "/page")).await.unwrap();
        assert_eq!(session.get::<String>(PREVIOUS_URI_KEY).as_deref(), Some("/page"));

        let cookie = format!("sess={}", session.id().unwrap());
        dispatcher
            .handle(HttpRequest::new("POST", "/form").with_header("cookie", cookie.clone()))
            .await
            .unwrap();
        dispatcher
            .handle(
                HttpRequest::new("GET", "/api")
                    .with_header("cookie", cookie.clone())
                    .with_header("x-requested-with", "XMLHttpRequest"),
            )
            .await
            .unwrap();
        dispatcher
            .handle(
                HttpRequest::new("GET", "/next")
                    .with_header("cookie", cookie)
                    .with_header("sec-purpose", "prefetch"),
            )
            .await
            .unwrap();
        assert_eq!(session.get::<String>(PREVIOUS_URI_KEY).as_deref(), Some("/page"));
    }
}
