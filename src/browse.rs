//! Directory browsing.
//!
//! Lists the direct children of a directory, one level deep, with size and
//! extension for files. Browsing never writes to the filesystem.
//!
//! By default any path on the machine can be listed. Pass a root to
//! [`PathBrowser::new`] (or set `[browser].root`) to confine browsing to one
//! directory tree; requested paths are canonicalized before the containment
//! check, so `..` and symlinks cannot escape it.

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::BrowserConfig;
use crate::error::{LoaderError, Result};
use crate::loader::SourceFormat;
use crate::models::{DirectoryListing, FileSystemEntry};

#[derive(Debug, Clone)]
pub struct PathBrowser {
    root: Option<PathBuf>,
    show_hidden: bool,
    excludes: GlobSet,
}

impl PathBrowser {
    pub fn new(root: Option<&Path>, show_hidden: bool, exclude_globs: &[String]) -> Result<Self> {
        let root = match root {
            Some(r) => Some(
                r.canonicalize()
                    .map_err(|e| LoaderError::access(r, e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            root,
            show_hidden,
            excludes: build_globset(exclude_globs)?,
        })
    }

    pub fn from_config(config: &BrowserConfig) -> Result<Self> {
        Self::new(
            config.root.as_deref(),
            config.show_hidden,
            &config.exclude_globs,
        )
    }

    /// Whether browsing is limited to a root directory.
    pub fn is_confined(&self) -> bool {
        self.root.is_some()
    }

    /// The path listed when the caller gives none: the root if configured,
    /// otherwise the working directory.
    pub fn default_path(&self) -> PathBuf {
        match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }

    /// Lists the entries directly inside `path`.
    ///
    /// Relative paths resolve against [`default_path`](Self::default_path).
    /// Fails with `Access` if the path is missing, unreadable, or outside the
    /// root, and with `NotADirectory` if it names a file.
    pub fn browse(&self, path: Option<&Path>) -> Result<DirectoryListing> {
        let requested = match path {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => self.default_path().join(p),
            None => self.default_path(),
        };

        let dir = requested
            .canonicalize()
            .map_err(|e| LoaderError::access(&requested, e.to_string()))?;

        if let Some(root) = &self.root {
            if !dir.starts_with(root) {
                return Err(LoaderError::access(&requested, "outside the browse root"));
            }
        }

        let meta = std::fs::metadata(&dir).map_err(|e| LoaderError::access(&dir, e.to_string()))?;
        if !meta.is_dir() {
            return Err(LoaderError::NotADirectory(dir));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                // An unreadable directory fails before yielding any child.
                Err(e) if e.depth() == 0 => {
                    return Err(LoaderError::access(&dir, e.to_string()));
                }
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();
            if !self.show_hidden && name.starts_with('.') {
                continue;
            }
            if self.excludes.is_match(&name) {
                continue;
            }

            entries.push(to_entry(entry.path(), name));
        }

        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

        let parent = dir
            .parent()
            .filter(|p| self.root.as_ref().map_or(true, |root| p.starts_with(root)))
            .map(Path::to_path_buf);

        debug!(path = %dir.display(), entries = entries.len(), "Browsed directory");

        Ok(DirectoryListing {
            path: dir,
            parent,
            entries,
        })
    }
}

fn to_entry(path: &Path, name: String) -> FileSystemEntry {
    // Follow symlinks so a link to a directory is browsable; fall back to
    // the link itself when the target is gone.
    let meta = std::fs::metadata(path).or_else(|_| std::fs::symlink_metadata(path));

    let is_dir = meta.as_ref().map(|m| m.is_dir()).unwrap_or(false);
    let modified = meta
        .as_ref()
        .ok()
        .and_then(|m| m.modified().ok())
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

    let (size, extension) = if is_dir {
        (None, None)
    } else {
        (
            meta.as_ref().ok().map(|m| m.len()),
            path.extension()
                .map(|e| e.to_string_lossy().to_lowercase()),
        )
    };

    let loadable = extension
        .as_deref()
        .map_or(false, |e| SourceFormat::from_extension(e).is_some());

    FileSystemEntry {
        path: path.to_path_buf(),
        name,
        is_dir,
        size,
        extension,
        modified,
        loadable,
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            LoaderError::InvalidArgument(format!("invalid exclude glob '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| LoaderError::InvalidArgument(e.to_string()))
}
