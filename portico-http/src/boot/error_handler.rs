//! Translation of errors into client facing responses.

use super::http::HttpBoot;
use super::requester_responser::RequesterResponserBoot;
use crate::requester::Requester;
use crate::views::SharedView;
use portico_config::{ConfigBoot, ConfigExt};
use portico_core::{
    App, Boot, BootDescriptor, Error, ErrorHandlers, HttpRequest, HttpResponse, Result,
    ThrowableHandler, WeakApp,
};
use portico_log::{debug, error};
use serde_json::json;
use std::sync::Arc;

/// Priority of the error responder among the error handlers.
pub const ERROR_HANDLER_PRIORITY: i32 = 1500;

/// Client message for a status code, `"<code> | <reason>"`.
pub fn status_message(code: u16) -> String {
    let reason = match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        410 => "Gone",
        419 => "Resource Expired",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => return "Invalid Request".to_string(),
    };
    format!("{} | {}", code, reason)
}

/// Media types with an error view, and the suffix of their view names.
const VIEW_FORMATS: [(&str, &str); 2] = [("text/html", ""), ("application/xml", ".xml")];

/// Answers errors with a json body, a rendered error view or plain text,
/// whichever the client accepts.
pub struct ErrorResponder {
    app: WeakApp,
}

impl ErrorResponder {
    pub fn new(app: WeakApp) -> Self {
        Self { app }
    }

    /// Response status and message code of `error`. `None` for errors left
    /// to other handlers.
    fn classify(&self, error: &Error, debug: bool) -> Option<(u16, u16)> {
        match error {
            Error::RouteNotFound(_) => Some((404, 404)),
            Error::InvalidSignature(_) => Some((403, 403)),
            Error::SessionValidation(_) | Error::InvalidToken(_) => Some((403, 419)),
            _ if debug => None,
            _ => Some((500, 500)),
        }
    }

    fn render_view(
        view: &SharedView,
        requester: &Requester,
        code: u16,
        status: u16,
        message: &str,
    ) -> Option<HttpResponse> {
        let accepted = requester.accept_header();
        let mimes: Vec<&str> = if accepted.is_empty() {
            vec!["text/html"]
        } else {
            accepted.iter().map(|a| a.mime()).collect()
        };

        for mime in mimes {
            let format = match mime {
                "*/*" | "text/*" => VIEW_FORMATS.first(),
                _ => VIEW_FORMATS.iter().find(|(m, _)| *m == mime),
            };
            let Some((mime, suffix)) = format else {
                continue;
            };

            let candidates = [
                format!("exception/{}{}", code, suffix),
                format!("exception/error{}", suffix),
            ];
            let Some(name) = candidates.iter().find(|name| view.exists(name)) else {
                continue;
            };
            match view.render(name, &json!({"code": code, "message": message})) {
                Ok(body) => {
                    return Some(
                        HttpResponse::new(status)
                            .with_body(body)
                            .with_header("content-type", format!("{}; charset=utf-8", mime)),
                    );
                }
                Err(e) => error!(target: "portico::errors", "error view '{}' failed: {}", name, e),
            }
        }
        None
    }
}

impl ThrowableHandler for ErrorResponder {
    fn handle(&self, error: Error) -> std::result::Result<HttpResponse, Error> {
        let Some(app) = self.app.upgrade() else {
            return Err(error);
        };
        let Some((status, code)) = self.classify(&error, app.is_debug()) else {
            return Err(error);
        };
        if status >= 500 {
            error!(target: "portico::errors", "{}", error);
        } else {
            debug!(target: "portico::errors", "{} answered with {}", error, status);
        }

        let message = status_message(code);
        let request = app.request().unwrap_or_else(|| HttpRequest::new("GET", "/"));
        let requester = Requester::new(request);

        if requester.wants_json() {
            return HttpResponse::new(status)
                .with_json(&json!({"status": status, "message": message}));
        }
        if let Ok(view) = app.get::<SharedView>()
            && let Some(response) = Self::render_view(&view, &requester, code, status, &message)
        {
            return Ok(response);
        }
        Ok(HttpResponse::new(status).with_text(message))
    }
}

/// Installs the [`ErrorResponder`].
///
/// With `app.debug` enabled, errors other than routing, signature and
/// session failures are not answered here so they reach the caller.
#[derive(Default)]
pub struct ErrorHandlerBoot;

impl Boot for ErrorHandlerBoot {
    fn descriptor(&self) -> BootDescriptor {
        BootDescriptor::of::<Self>()
            .depends_on::<ConfigBoot>()
            .depends_on::<HttpBoot>()
            .depends_on::<RequesterResponserBoot>()
    }

    fn boot(&self, app: &App) -> Result<()> {
        app.get::<ErrorHandlers>()?
            .add_arc(Arc::new(ErrorResponder::new(app.downgrade())), ERROR_HANDLER_PRIORITY);
        Ok(())
    }
}
