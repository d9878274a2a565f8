// Error-to-response translation

use crate::{Error, HttpResponse};
use parking_lot::RwLock;
use portico_log::{debug, warn};
use std::sync::Arc;

/// Turns an error into a response, or hands it back unhandled.
pub trait ThrowableHandler: Send + Sync {
    fn handle(&self, error: Error) -> std::result::Result<HttpResponse, Error>;
}

impl<F> ThrowableHandler for F
where
    F: Fn(Error) -> std::result::Result<HttpResponse, Error> + Send + Sync,
{
    fn handle(&self, error: Error) -> std::result::Result<HttpResponse, Error> {
        self(error)
    }
}

struct Entry {
    priority: i32,
    handler: Arc<dyn ThrowableHandler>,
}

/// Prioritized chain of [`ThrowableHandler`]s.
///
/// Handlers are tried highest priority first, in registration order for
/// equal priorities. The first one returning a response wins; each one that
/// declines passes the error on.
#[derive(Default)]
pub struct ErrorHandlers {
    handlers: RwLock<Vec<Entry>>,
}

impl ErrorHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: impl ThrowableHandler + 'static, priority: i32) -> &Self {
        self.add_arc(Arc::new(handler), priority)
    }

    pub fn add_arc(&self, handler: Arc<dyn ThrowableHandler>, priority: i32) -> &Self {
        let mut handlers = self.handlers.write();
        let index = handlers
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(handlers.len());
        handlers.insert(index, Entry { priority, handler });
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn handle_throwable(&self, error: Error) -> std::result::Result<HttpResponse, Error> {
        let handlers: Vec<_> = self.handlers.read().iter().map(|e| e.handler.clone()).collect();

        let mut error = error;
        for handler in handlers {
            match handler.handle(error) {
                Ok(response) => {
                    debug!(target: "portico::errors", "error translated to {}", response.status);
                    return Ok(response);
                }
                Err(forwarded) => error = forwarded,
            }
        }

        warn!(target: "portico::errors", "unhandled error: {}", error);
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(
        code: u16,
    ) -> impl (Fn(Error) -> std::result::Result<HttpResponse, Error>) + Send + Sync {
        move |_| Ok(HttpResponse::new(code))
    }

    #[test]
    fn test_highest_priority_wins() {
        let handlers = ErrorHandlers::new();
        handlers.add(status(500), 0);
        handlers.add(status(404), 1500);
        handlers.add(status(418), 100);

        let res = handlers.handle_throwable(Error::Internal("x".into())).unwrap();
        assert_eq!(res.status, 404);
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let handlers = ErrorHandlers::new();
        handlers.add(status(401), 10);
        handlers.add(status(402), 10);
        assert_eq!(handlers.handle_throwable(Error::Internal("x".into())).unwrap().status, 401);
    }

    #[test]
    fn test_forwarding() {
        let handlers = ErrorHandlers::new();
        handlers.add(
            |e: Error| match e {
                Error::RouteNotFound(_) => Ok(HttpResponse::not_found()),
                other => Err(other),
            },
            10,
        );

        let handled = handlers.handle_throwable(Error::RouteNotFound("/".into())).unwrap();
        assert_eq!(handled.status, 404);
        let err = handlers.handle_throwable(Error::Forbidden("no".into())).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }
}
