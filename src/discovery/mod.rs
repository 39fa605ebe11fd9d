//! File discovery: bounded directory traversal, classification and filtering.

pub mod classify;

pub use classify::{classify, Classification, FileCategory, Language, Priority};

use crate::error::{ConfigError, DiscoveryError};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Traversal and filtering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Maximum directory depth below the root.
    pub max_depth: usize,
    /// Include paths with a segment starting with `.`.
    pub include_hidden: bool,
    /// Extensions to keep (empty = all). Leading dots are ignored.
    pub extensions: Vec<String>,
    /// Files larger than this are skipped.
    pub max_file_size: Option<u64>,
    /// Resolve symlinks and use the target's metadata.
    pub follow_symlinks: bool,
    /// Glob patterns, matched against the path relative to the root.
    pub exclude: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            include_hidden: false,
            extensions: Vec::new(),
            max_file_size: None,
            follow_symlinks: false,
            exclude: Vec::new(),
        }
    }
}

/// A discovered filesystem entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Absolute path. For followed symlinks this is the resolved target.
    pub path: PathBuf,
    /// Path relative to the scan root, as seen during traversal.
    pub relative_path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub is_file: bool,
    pub category: FileCategory,
    pub language: Option<Language>,
    pub priority: Priority,
}

impl FileRecord {
    fn from_metadata(path: PathBuf, relative_path: PathBuf, meta: &Metadata, is_symlink: bool) -> Self {
        let name = relative_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");
        let class = if meta.is_dir() {
            Classification {
                category: FileCategory::Other,
                language: None,
                priority: Priority::Low,
            }
        } else {
            classify(name)
        };

        Self {
            path,
            relative_path,
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
            is_dir: meta.is_dir(),
            is_symlink,
            is_file: meta.is_file(),
            category: class.category,
            language: class.language,
            priority: class.priority,
        }
    }

    /// Relative path with forward slashes, used in findings and errors.
    pub fn display_path(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn extension(&self) -> Option<&str> {
        self.relative_path.extension().and_then(|e| e.to_str())
    }
}

/// A file left out by a filter, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub relative_path: PathBuf,
    pub reason: String,
}

/// Output of one traversal.
#[derive(Debug, Default, Clone)]
pub struct DiscoveryResult {
    /// Regular files that passed every filter, in traversal order.
    pub files: Vec<FileRecord>,
    pub directories: Vec<FileRecord>,
    /// Symlinks recorded but not followed.
    pub symlinks: Vec<FileRecord>,
    pub skipped: Vec<SkippedFile>,
    /// Non-fatal traversal errors (permission denied, loops, ...).
    pub errors: Vec<String>,
}

/// Directory walker applying the configured bounds and filters.
pub struct FileWalker {
    config: DiscoveryConfig,
    exclude: GlobSet,
}

impl FileWalker {
    pub fn new(config: DiscoveryConfig) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude {
            builder.add(Glob::new(pattern)?);
        }
        let exclude = builder.build()?;
        Ok(Self { config, exclude })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    fn is_hidden(entry: &DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
    }

    /// Prune hidden and excluded entries (and their subtrees).
    fn keep_entry(&self, entry: &DirEntry, root: &Path) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        if !self.config.include_hidden && Self::is_hidden(entry) {
            return false;
        }
        if self.exclude.is_empty() {
            return true;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        !self.exclude.is_match(relative)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        if self.config.extensions.is_empty() {
            return true;
        }
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext,
            None => return false,
        };
        self.config
            .extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Walk `root` and collect records. Only a missing or non-directory root fails.
    pub fn walk(&self, root: &Path) -> Result<DiscoveryResult, DiscoveryError> {
        let root = std::fs::canonicalize(root)
            .map_err(|_| DiscoveryError::RootNotFound(root.to_path_buf()))?;
        if !root.is_dir() {
            return Err(DiscoveryError::NotADirectory(root));
        }

        let mut result = DiscoveryResult::default();

        let walker = WalkDir::new(&root)
            .follow_links(self.config.follow_symlinks)
            .max_depth(self.config.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.keep_entry(e, &root));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Traversal error: {}", e);
                    result.errors.push(format!("Traversal error: {}", e));
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            self.record_entry(&root, &entry, &mut result);
        }

        tracing::debug!(
            "Discovered {} files, {} directories, {} symlinks under {}",
            result.files.len(),
            result.directories.len(),
            result.symlinks.len(),
            root.display()
        );

        Ok(result)
    }

    fn record_entry(&self, root: &Path, entry: &DirEntry, result: &mut DiscoveryResult) {
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();

        // Unfollowed link: record it, never read it.
        if entry.path_is_symlink() && !self.config.follow_symlinks {
            match std::fs::symlink_metadata(entry.path()) {
                Ok(meta) => result.symlinks.push(FileRecord::from_metadata(
                    entry.path().to_path_buf(),
                    relative,
                    &meta,
                    true,
                )),
                Err(e) => result
                    .errors
                    .push(format!("Cannot stat {}: {}", relative.display(), e)),
            }
            return;
        }

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                result
                    .errors
                    .push(format!("Cannot stat {}: {}", relative.display(), e));
                return;
            }
        };

        let path = if entry.path_is_symlink() {
            match std::fs::canonicalize(entry.path()) {
                Ok(resolved) => resolved,
                Err(e) => {
                    result.errors.push(format!(
                        "Cannot resolve symlink {}: {}",
                        relative.display(),
                        e
                    ));
                    return;
                }
            }
        } else {
            entry.path().to_path_buf()
        };

        let record = FileRecord::from_metadata(path, relative, &meta, entry.path_is_symlink());

        if record.is_dir {
            result.directories.push(record);
            return;
        }
        if !record.is_file {
            result.skipped.push(SkippedFile {
                relative_path: record.relative_path,
                reason: "not a regular file".to_string(),
            });
            return;
        }
        if !self.matches_extension(&record.relative_path) {
            return;
        }
        if let Some(max) = self.config.max_file_size {
            if record.size > max {
                result.skipped.push(SkippedFile {
                    reason: format!("size {} exceeds limit {}", record.size, max),
                    relative_path: record.relative_path,
                });
                return;
            }
        }

        result.files.push(record);
    }
}
