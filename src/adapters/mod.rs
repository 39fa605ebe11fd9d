//! Repository acquisition.
//!
//! A [`RepositorySource`] turns a location into a local directory to scan and
//! removes it again afterwards. Cloning remote repositories belongs to
//! callers; [`LocalSource`] covers directories already on disk.

pub mod local;

pub use local::LocalSource;

use crate::error::AcquisitionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What to acquire and how.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireRequest {
    pub url: String,
    pub timeout: Duration,
    /// Shallow clone depth, when the source clones.
    pub depth: Option<u32>,
    pub branch: Option<String>,
}

impl AcquireRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(60),
            depth: Some(1),
            branch: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

/// Descriptive metadata about an acquired repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryMetadata {
    pub url: String,
    pub owner: Option<String>,
    pub name: String,
    pub commit: Option<String>,
    pub branch: Option<String>,
    /// Total bytes of regular files.
    pub size: u64,
    pub file_count: usize,
}

/// A local copy ready for scanning.
#[derive(Debug, Clone)]
pub struct AcquiredRepository {
    pub root: PathBuf,
    pub metadata: RepositoryMetadata,
}

/// Source of repositories to scan.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Make the repository available locally.
    async fn acquire(&self, request: &AcquireRequest)
        -> Result<AcquiredRepository, AcquisitionError>;

    /// Remove the local copy. Idempotent; failures are only logged.
    async fn cleanup(&self, repository: &AcquiredRepository);
}
