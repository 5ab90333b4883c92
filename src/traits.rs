use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("git {op} exited with {status}: {stderr}")]
    CommandFailed {
        op: &'static str,
        status: String,
        stderr: String,
    },
    #[error("git {op} timed out after {timeout_secs}s")]
    Timeout { op: &'static str, timeout_secs: u64 },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Version-control operations needed to resolve a provenance tag.
#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Clones `uri` at `branch` into `dest`, which must not exist yet.
    async fn clone_branch(&self, uri: &str, branch: &str, dest: &Path) -> Result<(), VcsError>;

    /// Checks out `revision` inside an existing clone.
    async fn checkout(&self, workdir: &Path, revision: &str) -> Result<(), VcsError>;

    /// Returns a nearest-tag-plus-distance description of HEAD.
    async fn describe(&self, workdir: &Path) -> Result<String, VcsError>;
}
