//! Project workspace: safe path resolution, file I/O and per-path write locks.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::domain::errors::PathError;

/// Normalize a generator-supplied relative path to `a/b/c` form.
///
/// Rejects empty and absolute paths and any path whose `..` components
/// would leave the root. `.` components are dropped.
pub fn normalize_relative(relative: &str) -> Result<String, PathError> {
    let trimmed = relative.trim();
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }

    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(PathError::EscapesRoot(relative.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Absolute(relative.to_string()));
            }
        }
    }

    if parts.is_empty() {
        return Err(PathError::Empty);
    }
    Ok(parts.join("/"))
}

/// Resolve a generator-supplied relative path against `root`.
pub fn resolve_output_path(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    normalize_relative(relative).map(|clean| root.join(clean))
}

/// The directory a build writes into.
#[derive(Debug, Clone)]
pub struct ProjectWorkspace {
    root: PathBuf,
    locks: PathLocks,
}

impl ProjectWorkspace {
    /// Workspace rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: PathLocks::default(),
        }
    }

    /// Project directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for `relative`, refusing anything outside the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PathError> {
        resolve_output_path(&self.root, relative)
    }

    /// Per-path write locks shared by every writer.
    pub fn locks(&self) -> &PathLocks {
        &self.locks
    }

    /// Create or replace a file, creating parent directories as needed.
    ///
    /// Callers that may race on the same path must hold its lock.
    pub async fn write_file(&self, relative: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self
            .resolve(relative)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), bytes = content.len(), "wrote file");
        Ok(path)
    }

    /// Read a file if it exists. Unsafe paths and I/O errors read as `None`.
    pub async fn read_file(&self, relative: &str) -> Option<String> {
        let path = self.resolve(relative).ok()?;
        tokio::fs::read_to_string(path).await.ok()
    }

    /// Map a path reported by a tool (possibly absolute or `./`-prefixed)
    /// back to a path relative to the root.
    pub fn relativize(&self, reported: &str) -> String {
        let reported_path = Path::new(reported);
        let relative = reported_path
            .strip_prefix(&self.root)
            .unwrap_or(reported_path);
        let rendered = relative.to_string_lossy().replace('\\', "/");
        rendered.trim_start_matches("./").to_string()
    }
}

/// Lock table serializing writes to the same path.
///
/// Locks for several paths are always taken in sorted order so two tasks
/// sharing outputs cannot deadlock.
#[derive(Debug, Clone, Default)]
pub struct PathLocks {
    table: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl PathLocks {
    fn entry(&self, path: &str) -> Arc<AsyncMutex<()>> {
        let mut table = match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(table.entry(path.to_string()).or_default())
    }

    /// Lock every path in `paths`, keyed by its normalized form so
    /// spellings like `README.md` and `./README.md` share one lock.
    pub async fn lock_all<'a, I>(&self, paths: I) -> Vec<OwnedMutexGuard<()>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut keys: Vec<String> = paths
            .into_iter()
            .map(|p| normalize_relative(p).unwrap_or_else(|_| p.to_string()))
            .collect();
        keys.sort_unstable();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.entry(key).lock_owned().await);
        }
        guards
    }
}

// ---------------------------------------------------------------------------
// File classification (context store metadata)
// ---------------------------------------------------------------------------

/// Language tag from the file extension, `unknown` otherwise.
pub fn detect_language(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" => "javascript",
        "py" => "python",
        "rs" => "rust",
        "go" => "go",
        "sql" => "sql",
        "prisma" => "prisma",
        "json" => "json",
        "md" => "markdown",
        "yml" | "yaml" => "yaml",
        "toml" => "toml",
        _ => "unknown",
    }
}

/// Coarse role of a file guessed from its path.
pub fn detect_file_type(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    if lower.contains("api") || lower.contains("route") {
        "api_route"
    } else if lower.contains("component") || lower.ends_with(".tsx") {
        "component"
    } else if lower.contains("schema") || lower.contains("prisma") {
        "database_schema"
    } else if lower.contains("config") {
        "config"
    } else if lower.contains("test") || lower.contains("spec") {
        "test"
    } else {
        "source"
    }
}
