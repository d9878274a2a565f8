// Response emission

use crate::middleware::BoxFuture;
use crate::{HttpResponse, Result};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::Arc;

pub type EmitHook = Arc<dyn Fn(&HttpResponse) -> BoxFuture<Result<()>> + Send + Sync>;

fn hook<F, Fut>(f: F) -> EmitHook
where
    F: Fn(&HttpResponse) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |response: &HttpResponse| -> BoxFuture<Result<()>> { Box::pin(f(response)) })
}

/// Holds the response produced by one run and the hooks around emitting it.
#[derive(Default)]
pub struct ResponseEmitter {
    before: RwLock<Vec<EmitHook>>,
    after: RwLock<Vec<EmitHook>>,
    emitted: Mutex<Option<HttpResponse>>,
}

impl ResponseEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook run before the response is stored. An error aborts the emit.
    pub fn before_emit<F, Fut>(&self, f: F) -> &Self
    where
        F: Fn(&HttpResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.before.write().push(hook(f));
        self
    }

    pub fn after_emit<F, Fut>(&self, f: F) -> &Self
    where
        F: Fn(&HttpResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.after.write().push(hook(f));
        self
    }

    pub async fn emit(&self, response: HttpResponse) -> Result<()> {
        let before: Vec<EmitHook> = self.before.read().clone();
        for hook in before {
            hook(&response).await?;
        }

        *self.emitted.lock() = Some(response.clone());

        let after: Vec<EmitHook> = self.after.read().clone();
        for hook in after {
            hook(&response).await?;
        }
        Ok(())
    }

    /// Store `response` without running any hook.
    pub fn emit_unhooked(&self, response: HttpResponse) {
        *self.emitted.lock() = Some(response);
    }

    pub fn emitted(&self) -> Option<HttpResponse> {
        self.emitted.lock().clone()
    }

    pub fn take(&self) -> Option<HttpResponse> {
        self.emitted.lock().take()
    }
}
