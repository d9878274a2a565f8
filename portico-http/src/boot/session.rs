use super::middleware::MiddlewareBoot;
use crate::middleware::priority;
use crate::uri::UriExt;
use portico_config::{ConfigBoot, ConfigExt};
use portico_core::{App, Boot, BootDescriptor, MiddlewareDispatcher, ResponseEmitter, Result};
use portico_log::debug;
use portico_session::{
    CookiesProcessor, PreviousUriSession, SessionFactory, SessionMiddleware, SessionSettings,
};
use std::sync::Arc;

/// Registers the [`Session`](portico_session::Session) described by `session.toml` and its
/// middleware.
///
/// A [`SessionFactory`] already in the app wins over the configured one.
/// The session is saved before the response is emitted, and its cookie is
/// kept out of cookie encryption.
#[derive(Default)]
pub struct SessionBoot;

impl Boot for SessionBoot {
    fn descriptor(&self) -> BootDescriptor {
        BootDescriptor::of::<Self>()
            .depends_on::<ConfigBoot>()
            .depends_on::<MiddlewareBoot>()
    }

    fn boot(&self, app: &App) -> Result<()> {
        let config = app.config()?;
        config.load_optional("session.toml", "session", &app.dirs().group("config"))?;
        let settings = if config.has("session") {
            config.get::<SessionSettings>("session")?
        } else {
            SessionSettings::default()
        };

        let factory = match app.get::<SessionFactory>() {
            Ok(factory) => (*factory).clone(),
            Err(_) => SessionFactory::from_name(&settings.factory)?,
        };
        let session = Arc::new(factory.from_settings(&settings, &app.base_path())?);
        app.set_arc(session.clone());

        let dispatcher = app.get::<MiddlewareDispatcher>()?;
        dispatcher
            .alias("session", Arc::new(SessionMiddleware::new(session.clone())), priority::SESSION)
            .alias(
                "previous_uri",
                Arc::new(PreviousUriSession::new(session.clone())),
                priority::SESSION,
            );
        for middleware in &settings.middlewares {
            dispatcher.add_ref(middleware.as_str().into(), Some(priority::SESSION))?;
        }

        let saved = session.clone();
        app.get::<ResponseEmitter>()?.before_emit(move |_| {
            let session = saved.clone();
            async move { Ok(session.save().await?) }
        });

        let name = settings.name.clone();
        app.on::<CookiesProcessor, _>(move |processor| {
            processor.whitelist(name.clone());
        });

        debug!(target: "portico::session", "session '{}' ready", settings.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::{Dir, HttpRequest, HttpResponse, Next, from_fn};
    use portico_session::{MemorySessionStore, Session, SessionStore};
    use std::fs;

    fn app(session_toml: &str, store: Arc<MemorySessionStore>) -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("http.toml"), "base_path = \"/shop\"\n").unwrap();
        fs::write(dir.path().join("session.toml"), session_toml).unwrap();

        let app = App::new("test");
        app.dir(Dir::new(dir.path(), "config", "config", 10));
        app.set(SessionFactory::new(store));
        app.boot(SessionBoot);
        (dir, app)
    }

    #[tokio::test]
    async fn test_session_cookie_and_save() {
        let store = Arc::new(MemorySessionStore::new());
        let (_dir, app) = app("name = \"shop\"\n[config]\nsecure = false\n", store.clone());
        app.booting().unwrap();
        app.get::<MiddlewareDispatcher>().unwrap().add(
            from_fn("count", |req: HttpRequest, _next: Next| async move {
                if let Some(session) = req.extensions.get::<Arc<Session>>() {
                    session.set("visits", 1)?;
                }
                Ok(HttpResponse::ok())
            }),
            100,
        );

        let res = app.handle(HttpRequest::new("GET", "/shop/cart")).await.unwrap();
        let cookie = res.cookies.iter().find(|c| c.starts_with("shop=")).unwrap();
        assert!(cookie.contains("Path=/shop/"));

        let session = app.get::<Session>().unwrap();
        let id = session.id().unwrap();
        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.get::<i64>("visits"), Some(1));
        let previous = session.get::<String>(portico_session::PREVIOUS_URI_KEY);
        assert_eq!(previous.as_deref(), Some("/shop/cart"));
    }

    #[tokio::test]
    async fn test_changed_agent_is_rejected() {
        let store = Arc::new(MemorySessionStore::new());
        let (_dir, app) = app("[config]\nvalidation = [\"user_agent\"]\n", store.clone());
        app.booting().unwrap();

        let first = app
            .handle(HttpRequest::new("GET", "/shop").with_header("user-agent", "firefox"))
            .await
            .unwrap();
        let cookie = first.cookies.iter().find(|c| c.starts_with("sess=")).unwrap();
        let pair = cookie.split(';').next().unwrap().to_string();

        let err = app
            .handle(
                HttpRequest::new("GET", "/shop")
                    .with_header("user-agent", "curl")
                    .with_header("cookie", pair),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, portico_core::Error::SessionValidation(_)));
    }

    #[test]
    fn test_unknown_factory_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("http.toml"), "").unwrap();
        fs::write(dir.path().join("session.toml"), "factory = \"redis\"\n").unwrap();

        let app = App::new("test");
        app.dir(Dir::new(dir.path(), "config", "config", 10));
        app.boot(SessionBoot);
        assert!(app.booting().is_err());
    }
}
