use super::http::HttpBoot;
use crate::requester::Requester;
use crate::responser::Responser;
use crate::views::{HandlebarsView, SharedView};
use portico_core::{App, Boot, BootDescriptor, Result};
use portico_log::debug;
use std::sync::Arc;

/// Registers the [`Responser`] and, when the app has view dirs, a
/// handlebars view system.
#[derive(Default)]
pub struct RequesterResponserBoot;

impl Boot for RequesterResponserBoot {
    fn descriptor(&self) -> BootDescriptor {
        BootDescriptor::of::<Self>().depends_on::<HttpBoot>()
    }

    fn boot(&self, app: &App) -> Result<()> {
        if !app.has::<SharedView>() {
            let dirs: Vec<_> = app
                .dirs()
                .group("views")
                .into_iter()
                .filter(|d| d.path.is_dir())
                .collect();
            if !dirs.is_empty() {
                let view = HandlebarsView::from_dirs(&dirs)?;
                debug!(target: "portico::http", "loaded {} views", view.names().len());
                let view: SharedView = Arc::new(view);
                app.set(view);
            }
        }

        let view = app.get::<SharedView>().ok().map(|v| (*v).clone());
        app.set(Responser::new(view));
        Ok(())
    }
}

/// Requester and responser access on the app.
pub trait RequesterExt {
    /// Requester over the current request.
    fn requester(&self) -> Option<Requester>;

    fn responser(&self) -> Responser;
}

impl RequesterExt for App {
    fn requester(&self) -> Option<Requester> {
        self.request().map(Requester::new)
    }

    fn responser(&self) -> Responser {
        self.get::<Responser>().map(|r| (*r).clone()).unwrap_or_default()
    }
}
