use async_trait::async_trait;
use portico_core::{HttpRequest, HttpResponse, Middleware, Next, Result};
use portico_log::trace;

const OVERRIDABLE: [&str; 3] = ["PUT", "PATCH", "DELETE"];

/// Lets html forms issue `PUT`, `PATCH` and `DELETE` requests.
///
/// A `POST` carrying a `_method` form field or an `X-Http-Method-Override`
/// header continues with that method. Other methods and other override
/// values are left alone.
#[derive(Debug, Default)]
pub struct MethodOverride;

impl MethodOverride {
    pub const FIELD: &'static str = "_method";
    pub const HEADER: &'static str = "x-http-method-override";

    fn requested(req: &HttpRequest) -> Option<String> {
        let method = req
            .form()
            .remove(Self::FIELD)
            .or_else(|| req.header(Self::HEADER).map(str::to_string))?
            .to_ascii_uppercase();
        OVERRIDABLE.contains(&method.as_str()).then_some(method)
    }
}

#[async_trait]
impl Middleware for MethodOverride {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse> {
        if req.method == "POST"
            && let Some(method) = Self::requested(&req)
        {
            trace!(target: "portico::http", "method overridden to {}", method);
            req.method = method;
        }
        next(req).await
    }

    fn name(&self) -> &str {
        "method_override"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::MiddlewareDispatcher;
    use portico_core::handler_fn;
    use std::sync::Arc;

    async fn method_seen(req: HttpRequest) -> String {
        let dispatcher = MiddlewareDispatcher::with_fallback_response(HttpResponse::ok());
        dispatcher.add(Arc::new(MethodOverride), 5100);
        let echo = handler_fn(|req: HttpRequest| async move {
            Ok(HttpResponse::ok().with_text(req.method))
        });
        dispatcher.handle_with(req, echo).await.unwrap().body_string()
    }

    #[tokio::test]
    async fn test_form_field_override() {
        let req = HttpRequest::new("POST", "/posts/1").with_body("_method=delete&title=x");
        assert_eq!(method_seen(req).await, "DELETE");
    }

    #[tokio::test]
    async fn test_header_override() {
        let req =
            HttpRequest::new("POST", "/posts/1").with_header("X-Http-Method-Override", "PATCH");
        assert_eq!(method_seen(req).await, "PATCH");
    }

    #[tokio::test]
    async fn test_only_post_and_known_methods() {
        let get = HttpRequest::new("GET", "/").with_header("X-Http-Method-Override", "DELETE");
        assert_eq!(method_seen(get).await, "GET");

        let bogus = HttpRequest::new("POST", "/").with_body("_method=TRACE");
        assert_eq!(method_seen(bogus).await, "POST");
    }
}
