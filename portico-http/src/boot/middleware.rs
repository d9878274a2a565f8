use super::http::HttpBoot;
use async_trait::async_trait;
use portico_core::{
    App, Boot, BootDescriptor, Error, ErrorHandlers, HttpResponse, MiddlewareDispatcher, Phase,
    Result,
};
use portico_log::debug;

/// Registers the middleware dispatcher and runs the current request through
/// it on every run cycle.
///
/// Errors leaving the stack are translated by the [`ErrorHandlers`]; the
/// resulting response is handed to [`HttpBoot`] for emission.
#[derive(Default)]
pub struct MiddlewareBoot;

#[async_trait]
impl Boot for MiddlewareBoot {
    fn descriptor(&self) -> BootDescriptor {
        BootDescriptor::of::<Self>()
            .depends_on::<HttpBoot>()
            .rebootable(Phase::Terminate)
    }

    fn boot(&self, app: &App) -> Result<()> {
        if !app.has::<MiddlewareDispatcher>() {
            app.set(MiddlewareDispatcher::with_fallback_response(HttpResponse::ok()));
        }
        Ok(())
    }

    async fn terminate(&self, app: &App) -> Result<()> {
        let Ok(dispatcher) = app.get::<MiddlewareDispatcher>() else {
            return Ok(());
        };
        let request = app.request().ok_or_else(|| {
            Error::Internal(format!("app '{}' has no request to dispatch", app.name()))
        })?;

        debug!(
            target: "portico::http",
            "dispatching {} {} through {} middleware",
            request.method,
            request.path,
            dispatcher.len()
        );
        let response = match dispatcher.handle(request).await {
            Ok(response) => response,
            Err(e) => app.get::<ErrorHandlers>()?.handle_throwable(e)?,
        };
        app.get::<HttpBoot>()?.set_response(response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::{HttpRequest, Next, from_fn};

    #[tokio::test]
    async fn test_dispatches_request() {
        let app = App::new("test");
        app.boot(MiddlewareBoot);
        app.booting().unwrap();
        app.get::<MiddlewareDispatcher>().unwrap().add(
            from_fn("hello", |req: HttpRequest, _next: Next| async move {
                Ok(HttpResponse::ok().with_text(format!("hello {}", req.path)))
            }),
            100,
        );

        let res = app.handle(HttpRequest::new("GET", "/world")).await.unwrap();
        assert_eq!(res.body_string(), "hello /world");
    }

    #[tokio::test]
    async fn test_empty_stack_answers_ok() {
        let app = App::new("test");
        app.boot(MiddlewareBoot);
        let res = app.handle(HttpRequest::new("GET", "/")).await.unwrap();
        assert_eq!(res.status, 200);
        assert!(res.body.is_empty());
    }

    #[tokio::test]
    async fn test_unhandled_errors_propagate() {
        let app = App::new("test");
        app.boot(MiddlewareBoot);
        app.booting().unwrap();
        app.get::<MiddlewareDispatcher>().unwrap().add(
            from_fn("fail", |_req: HttpRequest, _next: Next| async {
                Err(Error::Internal("boom".into()))
            }),
            100,
        );

        let err = app.handle(HttpRequest::new("GET", "/")).await.unwrap_err();
        assert!(matches!(err, Error::Internal(ref msg) if msg == "boom"));
    }
}
