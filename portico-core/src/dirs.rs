// Application directories

use std::path::{Path, PathBuf};

/// A directory known to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dir {
    pub path: PathBuf,
    pub name: String,
    pub group: String,
    pub priority: i32,
}

impl Dir {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        group: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            group: group.into(),
            priority,
        }
    }

    /// `path` joined with `file`.
    pub fn file(&self, file: impl AsRef<Path>) -> PathBuf {
        self.path.join(file)
    }
}

/// Registry of directories grouped by purpose (`config`, `views`, ...).
#[derive(Debug, Clone, Default)]
pub struct Dirs {
    dirs: Vec<Dir>,
}

impl Dirs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dir; a dir with the same name is replaced.
    pub fn dir(&mut self, dir: Dir) -> &mut Self {
        self.dirs.retain(|d| d.name != dir.name);
        self.dirs.push(dir);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Dir> {
        self.dirs.iter().find(|d| d.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Dirs of `group`, highest priority first.
    pub fn group(&self, group: &str) -> Vec<Dir> {
        let mut dirs: Vec<Dir> = self.dirs.iter().filter(|d| d.group == group).cloned().collect();
        dirs.sort_by(|a, b| b.priority.cmp(&a.priority));
        dirs
    }

    pub fn all(&self) -> &[Dir] {
        &self.dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_sorted_by_priority() {
        let mut dirs = Dirs::new();
        dirs.dir(Dir::new("/app/config", "config", "config", 10))
            .dir(Dir::new("/app/config/backend", "config.backend", "config", 20))
            .dir(Dir::new("/app/views", "views", "views", 10));

        let config = dirs.group("config");
        assert_eq!(config.len(), 2);
        assert_eq!(config[0].name, "config.backend");
        assert!(dirs.group("missing").is_empty());
    }

    #[test]
    fn test_same_name_replaces() {
        let mut dirs = Dirs::new();
        dirs.dir(Dir::new("/a", "config", "config", 10));
        dirs.dir(Dir::new("/b", "config", "config", 10));
        assert_eq!(dirs.all().len(), 1);
        assert_eq!(dirs.get("config").unwrap().file("http.toml"), PathBuf::from("/b/http.toml"));
    }
}
