// Cookies middleware

use super::processor::CookiesProcessor;
use super::queue::QueuedCookies;
use async_trait::async_trait;
use portico_core::{HttpRequest, HttpResponse, Middleware, Next, Result};
use std::sync::Arc;

/// Decodes request cookies into [`CookieValues`](super::CookieValues) and
/// writes encoded response and queued cookies back.
///
/// A fresh [`QueuedCookies`] is placed in the request extensions unless an
/// earlier layer already put one there.
pub struct CookiesMiddleware {
    processor: Arc<CookiesProcessor>,
}

impl CookiesMiddleware {
    pub fn new(processor: Arc<CookiesProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl Middleware for CookiesMiddleware {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse> {
        let values = self.processor.decode(&req);
        req.extensions.insert(values);

        let queue = match req.extensions.get::<Arc<QueuedCookies>>() {
            Some(queue) => queue.clone(),
            None => {
                let queue = Arc::new(QueuedCookies::new());
                req.extensions.insert(queue.clone());
                queue
            }
        };

        let response = next(req).await?;
        Ok(self.processor.encode_response(response, queue.drain())?)
    }

    fn name(&self) -> &str {
        "cookies"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{Cookie, CookieDefaults, CookieValues};
    use portico_core::{MiddlewareDispatcher, handler_fn};

    #[tokio::test]
    async fn test_values_and_queue_reach_the_handler() {
        let processor = Arc::new(CookiesProcessor::new(CookieDefaults::default()));
        let dispatcher = MiddlewareDispatcher::new(handler_fn(|req: HttpRequest| async move {
            let theme = req
                .extensions
                .get::<CookieValues>()
                .and_then(|v| v.get("theme").map(str::to_string))
                .unwrap_or_default();
            if let Some(queue) = req.extensions.get::<Arc<QueuedCookies>>() {
                queue.queue(Cookie::new("seen", "1"));
            }
            Ok(HttpResponse::ok().with_text(theme))
        }));
        dispatcher.add(Arc::new(CookiesMiddleware::new(processor)), 6100);

        let res = dispatcher
            .handle(HttpRequest::new("GET", "/").with_header("cookie", "theme=dark"))
            .await
            .unwrap();
        assert_eq!(res.body_string(), "dark");
        assert_eq!(res.cookies.len(), 1);
        assert!(res.cookies[0].starts_with("seen=1; Path=/"));
    }
}
