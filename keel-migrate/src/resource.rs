//! Resolution of external content referenced by changes.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{MigrateResult, MigrationError};

/// Resolves a logical path to text content.
///
/// `relative_to` is the path of the changelog that references the resource; when
/// present, `path` is resolved against its directory.
pub trait ResourceAccessor: Send + Sync + fmt::Debug {
    /// Read a resource as UTF-8 text.
    fn read_to_string(&self, path: &str, relative_to: Option<&str>) -> MigrateResult<String>;

    /// Whether a resource exists.
    fn exists(&self, path: &str, relative_to: Option<&str>) -> bool {
        self.read_to_string(path, relative_to).is_ok()
    }
}

/// Join `path` onto the directory of `relative_to` and fold `.` / `..` segments.
pub fn resolve_path(path: &str, relative_to: Option<&str>) -> String {
    let joined = match relative_to.and_then(|r| Path::new(r).parent()) {
        Some(parent) => parent.join(path),
        None => PathBuf::from(path),
    };

    let mut parts: Vec<String> = Vec::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::RootDir => parts.push(String::new()),
            other => parts.push(other.as_os_str().to_string_lossy().into_owned()),
        }
    }
    parts.join("/")
}

/// Reads resources from one or more directories on disk.
#[derive(Debug, Clone)]
pub struct FileSystemResourceAccessor {
    roots: Vec<PathBuf>,
}

impl FileSystemResourceAccessor {
    /// Create an accessor searching `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    /// Add another search root, consulted after the existing ones.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Search roots.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl ResourceAccessor for FileSystemResourceAccessor {
    fn read_to_string(&self, path: &str, relative_to: Option<&str>) -> MigrateResult<String> {
        let logical = resolve_path(path, relative_to);
        for root in &self.roots {
            let candidate = root.join(&logical);
            if candidate.is_file() {
                return std::fs::read_to_string(&candidate).map_err(MigrationError::Io);
            }
        }
        Err(MigrationError::ResourceNotFound(logical))
    }
}

/// Resources held in memory, keyed by logical path.
#[derive(Debug, Default)]
pub struct InMemoryResourceAccessor {
    files: RwLock<HashMap<String, String>>,
}

impl InMemoryResourceAccessor {
    /// Create an empty accessor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resource.
    pub fn insert(&self, path: impl AsRef<str>, content: impl Into<String>) {
        self.files
            .write()
            .insert(resolve_path(path.as_ref(), None), content.into());
    }

    /// Add a resource, builder style.
    pub fn with_file(self, path: impl AsRef<str>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }
}

impl ResourceAccessor for InMemoryResourceAccessor {
    fn read_to_string(&self, path: &str, relative_to: Option<&str>) -> MigrateResult<String> {
        let logical = resolve_path(path, relative_to);
        self.files
            .read()
            .get(&logical)
            .cloned()
            .ok_or(MigrationError::ResourceNotFound(logical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("a.sql", None), "a.sql");
        assert_eq!(resolve_path("a.sql", Some("db/changelog.yaml")), "db/a.sql");
        assert_eq!(
            resolve_path("../sql/./a.sql", Some("db/main/changelog.yaml")),
            "db/sql/a.sql"
        );
        assert_eq!(resolve_path("a.sql", Some("changelog.yaml")), "a.sql");
    }

    #[test]
    fn test_in_memory_accessor() {
        let accessor = InMemoryResourceAccessor::new().with_file("db/seed.sql", "INSERT 1");
        assert_eq!(
            accessor.read_to_string("seed.sql", Some("db/changelog.yaml")).unwrap(),
            "INSERT 1"
        );
        assert!(accessor.exists("db/seed.sql", None));
        assert!(matches!(
            accessor.read_to_string("missing.sql", None),
            Err(MigrationError::ResourceNotFound(path)) if path == "missing.sql"
        ));
    }

    #[test]
    fn test_file_system_accessor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("db")).unwrap();
        std::fs::write(dir.path().join("db/init.sql"), "CREATE TABLE t (id INT);").unwrap();

        let accessor = FileSystemResourceAccessor::new(dir.path());
        let content = accessor
            .read_to_string("init.sql", Some("db/changelog.yaml"))
            .unwrap();
        assert_eq!(content, "CREATE TABLE t (id INT);");
        assert!(!accessor.exists("nope.sql", None));
    }
}
