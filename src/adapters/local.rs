//! Source for repositories already checked out on disk.

use super::{AcquireRequest, AcquiredRepository, RepositoryMetadata, RepositorySource};
use crate::error::AcquisitionError;
use async_trait::async_trait;
use git2::Repository;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Uses a local directory as-is. Cleanup never deletes anything.
#[derive(Debug, Clone, Default)]
pub struct LocalSource;

impl LocalSource {
    pub fn new() -> Self {
        Self
    }

    /// Accepts a plain path or a `file://` URL. Remote URLs are rejected.
    fn resolve(url: &str) -> Result<PathBuf, AcquisitionError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(AcquisitionError::InvalidUrl(url.to_string()));
        }
        if let Some(path) = trimmed.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        if trimmed.contains("://") || trimmed.starts_with("git@") {
            return Err(AcquisitionError::InvalidUrl(format!(
                "{} (only local paths can be scanned directly)",
                url
            )));
        }
        Ok(PathBuf::from(trimmed))
    }

    fn metadata(url: &str, root: &Path) -> RepositoryMetadata {
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let owner = root
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(str::to_string);
        let (branch, commit) = read_git_head(root);

        let mut size = 0;
        let mut file_count = 0;
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                file_count += 1;
                size += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        RepositoryMetadata {
            url: url.to_string(),
            owner,
            name,
            commit,
            branch,
            size,
            file_count,
        }
    }
}

/// Branch and commit of the repository at `root`. Missing or unborn
/// repositories yield nothing; a detached HEAD has a commit but no branch.
fn read_git_head(root: &Path) -> (Option<String>, Option<String>) {
    let repo = match Repository::open(root) {
        Ok(repo) => repo,
        Err(_) => return (None, None),
    };
    let head = match repo.head() {
        Ok(head) => head,
        Err(e) => {
            tracing::debug!("No HEAD in {}: {}", root.display(), e.message());
            return (None, None);
        }
    };

    let branch = if head.is_branch() {
        head.shorthand().map(str::to_string)
    } else {
        None
    };
    let commit = head.peel_to_commit().ok().map(|c| c.id().to_string());
    (branch, commit)
}

#[async_trait]
impl RepositorySource for LocalSource {
    async fn acquire(
        &self,
        request: &AcquireRequest,
    ) -> Result<AcquiredRepository, AcquisitionError> {
        let path = Self::resolve(&request.url)?;
        let root = tokio::fs::canonicalize(&path)
            .await
            .map_err(|_| AcquisitionError::NotFound(path.display().to_string()))?;
        if !root.is_dir() {
            return Err(AcquisitionError::NotFound(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let url = request.url.clone();
        let walk_root = root.clone();
        let task = tokio::task::spawn_blocking(move || Self::metadata(&url, &walk_root));
        let metadata = match tokio::time::timeout(request.timeout, task).await {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(e)) => return Err(AcquisitionError::Failed(e.to_string())),
            Err(_) => {
                return Err(AcquisitionError::Timeout {
                    url: request.url.clone(),
                    secs: request.timeout.as_secs(),
                })
            }
        };

        if let (Some(wanted), Some(actual)) = (&request.branch, &metadata.branch) {
            if wanted != actual {
                tracing::warn!(
                    "Requested branch {} but {} is on {}",
                    wanted,
                    root.display(),
                    actual
                );
            }
        }

        tracing::info!(
            "Acquired {} ({} files, {} bytes)",
            root.display(),
            metadata.file_count,
            metadata.size
        );
        Ok(AcquiredRepository { root, metadata })
    }

    async fn cleanup(&self, repository: &AcquiredRepository) {
        tracing::debug!("Leaving local repository {} in place", repository.root.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Oid, RepositoryInitOptions, Signature};
    use std::fs;
    use tempfile::TempDir;

    /// Initialise a repository on `main` with one empty commit.
    fn init_repo(path: &Path) -> (Repository, Oid) {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(path, &opts).unwrap();
        let oid = {
            let tree_id = repo.index().unwrap().write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = Signature::now("test", "test@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap()
        };
        (repo, oid)
    }

    #[tokio::test]
    async fn test_acquire_local_directory() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("acme").join("widget");
        fs::create_dir_all(&repo).unwrap();
        let (_, oid) = init_repo(&repo);
        fs::write(repo.join("index.ts"), "export {};\n").unwrap();
        fs::write(repo.join("README.md"), "# widget\n").unwrap();

        let source = LocalSource::new();
        let request = AcquireRequest::new(repo.to_str().unwrap());
        let acquired = source.acquire(&request).await.unwrap();

        assert_eq!(acquired.metadata.name, "widget");
        assert_eq!(acquired.metadata.owner.as_deref(), Some("acme"));
        assert_eq!(acquired.metadata.branch.as_deref(), Some("main"));
        assert_eq!(acquired.metadata.commit, Some(oid.to_string()));
        assert_eq!(acquired.metadata.file_count, 2);
        assert_eq!(acquired.metadata.size, 20);

        source.cleanup(&acquired).await;
        source.cleanup(&acquired).await;
        assert!(repo.exists());
    }

    #[tokio::test]
    async fn test_acquire_failures() {
        let source = LocalSource::new();

        let err = source.acquire(&AcquireRequest::new("")).await.unwrap_err();
        assert_eq!(err.category(), "invalid_url");

        let err = source
            .acquire(&AcquireRequest::new("https://github.com/acme/widget"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "invalid_url");

        let err = source
            .acquire(&AcquireRequest::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "not_found");
    }

    #[test]
    fn test_packed_refs() {
        let tmp = TempDir::new().unwrap();
        let (_, oid) = init_repo(tmp.path());

        // What `git pack-refs --all` leaves behind.
        fs::remove_file(tmp.path().join(".git/refs/heads/main")).unwrap();
        fs::write(
            tmp.path().join(".git/packed-refs"),
            format!("# pack-refs with: peeled fully-peeled sorted \n{} refs/heads/main\n", oid),
        )
        .unwrap();

        assert_eq!(
            read_git_head(tmp.path()),
            (Some("main".to_string()), Some(oid.to_string()))
        );
    }

    #[test]
    fn test_detached_head() {
        let tmp = TempDir::new().unwrap();
        let (repo, oid) = init_repo(tmp.path());
        repo.set_head_detached(oid).unwrap();

        assert_eq!(read_git_head(tmp.path()), (None, Some(oid.to_string())));
    }

    #[test]
    fn test_not_a_repository() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(read_git_head(tmp.path()), (None, None));

        Repository::init(tmp.path()).unwrap();
        assert_eq!(read_git_head(tmp.path()), (None, None));
    }
}
