//! Views rendered by the responser and the error handler.

use handlebars::Handlebars;
use parking_lot::RwLock;
use portico_core::{Dir, Error, Result};
use portico_log::{debug, trace};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Named templates rendered with JSON data.
pub trait View: Send + Sync {
    fn exists(&self, view: &str) -> bool;

    fn render(&self, view: &str, data: &serde_json::Value) -> Result<String>;
}

/// The view as held by the container.
pub type SharedView = Arc<dyn View>;

const TEMPLATE_EXTENSION: &str = "hbs";

/// Handlebars templates loaded from view directories.
///
/// A file `exception/404.xml.hbs` below a view dir is registered as the
/// view `exception/404.xml`.
pub struct HandlebarsView {
    handlebars: RwLock<Handlebars<'static>>,
}

impl Default for HandlebarsView {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlebarsView {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        Self {
            handlebars: RwLock::new(handlebars),
        }
    }

    /// Load the templates of `dirs`. Dirs are given highest priority first;
    /// a template found in a higher priority dir is kept.
    pub fn from_dirs(dirs: &[Dir]) -> Result<Self> {
        let view = Self::new();
        for dir in dirs.iter().rev() {
            if dir.path.is_dir() {
                view.load_dir(&dir.path, &dir.path)?;
            }
        }
        let templates = view.handlebars.read().get_templates().len();
        debug!(target: "portico::views", "loaded {} templates", templates);
        Ok(view)
    }

    fn load_dir(&self, root: &Path, dir: &Path) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.load_dir(root, &path)?;
                continue;
            }
            if path.extension().is_none_or(|ext| ext != TEMPLATE_EXTENSION) {
                continue;
            }

            let name = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .with_extension("")
                .to_string_lossy()
                .replace('\\', "/");
            trace!(target: "portico::views", "registering view {}", name);
            self.register(&name, &fs::read_to_string(&path)?)?;
        }
        Ok(())
    }

    pub fn register(&self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .write()
            .register_template_string(name, template)
            .map_err(|e| Error::Internal(format!("invalid view '{}': {}", name, e)))
    }

    pub fn names(&self) -> Vec<String> {
        self.handlebars.read().get_templates().keys().cloned().collect()
    }
}

impl View for HandlebarsView {
    fn exists(&self, view: &str) -> bool {
        self.handlebars.read().has_template(view)
    }

    fn render(&self, view: &str, data: &serde_json::Value) -> Result<String> {
        self.handlebars
            .read()
            .render(view, data)
            .map_err(|e| Error::Internal(format!("rendering view '{}' failed: {}", view, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_and_render() {
        let view = HandlebarsView::new();
        view.register("hello", "Hello {{name}}!").unwrap();
        assert!(view.exists("hello"));
        assert!(!view.exists("missing"));
        assert_eq!(view.render("hello", &json!({"name": "Ada"})).unwrap(), "Hello Ada!");
        assert!(view.render("missing", &json!({})).is_err());
    }

    #[test]
    fn test_from_dirs_prefers_higher_priority() {
        let low = tempfile::tempdir().unwrap();
        let high = tempfile::tempdir().unwrap();
        fs::create_dir_all(low.path().join("exception")).unwrap();
        fs::create_dir_all(high.path().join("exception")).unwrap();
        fs::write(low.path().join("exception/error.hbs"), "low {{code}}").unwrap();
        fs::write(low.path().join("exception/404.xml.hbs"), "<code>{{code}}</code>").unwrap();
        fs::write(high.path().join("exception/error.hbs"), "high {{code}}").unwrap();
        fs::write(high.path().join("notes.txt"), "ignored").unwrap();

        let dirs = vec![
            Dir::new(high.path(), "views.high", "views", 20),
            Dir::new(low.path(), "views", "views", 10),
        ];
        let view = HandlebarsView::from_dirs(&dirs).unwrap();

        assert_eq!(view.render("exception/error", &json!({"code": 500})).unwrap(), "high 500");
        assert!(view.exists("exception/404.xml"));
        assert_eq!(view.names().len(), 2);
    }
}
