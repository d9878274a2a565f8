//! Response builders.

use crate::views::SharedView;
use portico_core::{HttpResponse, Result};
use serde::Serialize;

/// Builds responses, rendering views when a view system is available.
#[derive(Clone, Default)]
pub struct Responser {
    view: Option<SharedView>,
}

impl Responser {
    pub fn new(view: Option<SharedView>) -> Self {
        Self { view }
    }

    pub fn view(&self) -> Option<&SharedView> {
        self.view.as_ref()
    }

    pub fn json<T: Serialize>(&self, data: &T, code: u16) -> Result<HttpResponse> {
        HttpResponse::new(code).with_json(data)
    }

    pub fn html(&self, html: impl Into<String>, code: u16) -> HttpResponse {
        HttpResponse::new(code).with_html(html)
    }

    /// Raw body without a content type.
    pub fn write(&self, data: impl Into<Vec<u8>>, code: u16) -> HttpResponse {
        HttpResponse::new(code).with_body(data)
    }

    /// Render `view` as html. Fails when no view system is configured.
    pub fn render(&self, view: &str, data: &serde_json::Value, code: u16) -> Result<HttpResponse> {
        let renderer = self.view.as_ref().ok_or_else(|| {
            portico_core::Error::Internal(format!("no view system to render '{}'", view))
        })?;
        Ok(self.html(renderer.render(view, data)?, code))
    }

    pub fn redirect(&self, uri: impl Into<String>, code: u16) -> HttpResponse {
        HttpResponse::redirect(uri, code)
    }
}
