//! Provenance resolver.
//!
//! Clones a repository at its branch, checks out the pinned revision and asks
//! for a `describe`-style tag. Each version-control step runs under a timeout
//! and inside an ephemeral [`CloneWorkspace`] that is removed on drop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::traits::{VcsBackend, VcsError};

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Number of revision characters kept in a fallback label.
const FALLBACK_REVISION_CHARS: usize = 8;

/// What to report when a tag cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagFallback {
    /// `rev-<first 8 characters of the revision>`
    #[default]
    RevisionLabel,

    /// No tag at all.
    Absent,
}

impl TagFallback {
    pub fn label(&self, revision: &str) -> Option<String> {
        match self {
            TagFallback::RevisionLabel if !revision.is_empty() => {
                let short: String = revision.chars().take(FALLBACK_REVISION_CHARS).collect();
                Some(format!("rev-{}", short))
            }
            _ => None,
        }
    }
}

/// Ephemeral directory holding one clone.
///
/// # RAII Cleanup
///
/// `CloneWorkspace` implements [`Drop`] so the directory is removed on every
/// exit path: success, VCS failure, timeout or panic. It does not implement
/// `Clone`; copy `path` if it needs to outlive the workspace.
#[derive(Debug)]
pub struct CloneWorkspace {
    /// Directory the repository is cloned into (does not exist until cloned)
    pub path: PathBuf,

    root: PathBuf,

    /// Whether to delete the directory on drop.
    pub(crate) cleanup_on_drop: bool,
}

impl CloneWorkspace {
    /// Creates a fresh, uniquely named workspace under `parent`.
    pub fn create_in(parent: &Path, cleanup_on_drop: bool) -> std::io::Result<Self> {
        let root = parent.join(format!(
            "recipe-provenance-{}-{}",
            std::process::id(),
            WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&root)?;

        Ok(Self {
            path: root.join("repo"),
            root,
            cleanup_on_drop,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for CloneWorkspace {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.root.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.root) {
                warn!(
                    path = %self.root.display(),
                    error = %e,
                    "Failed to remove clone workspace"
                );
            }
        }
    }
}

/// Resolves provenance tags through a [`VcsBackend`].
pub struct ProvenanceResolver<V: VcsBackend> {
    backend: Arc<V>,

    /// Timeout for each VCS operation (default: 5 minutes)
    op_timeout: Duration,

    fallback: TagFallback,

    /// Keep clone directories around for inspection.
    keep_workdirs: bool,

    workspace_parent: PathBuf,
}

impl<V: VcsBackend> ProvenanceResolver<V> {
    /// Creates a resolver.
    ///
    /// Default configuration:
    /// - Timeout: 5 minutes per operation
    /// - Fallback: [`TagFallback::RevisionLabel`]
    /// - Workspaces removed after use, under the system temp dir
    pub fn new(backend: Arc<V>) -> Self {
        Self {
            backend,
            op_timeout: Duration::from_secs(300),
            fallback: TagFallback::default(),
            keep_workdirs: false,
            workspace_parent: std::env::temp_dir(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, fallback: TagFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_keep_workdirs(mut self, keep: bool) -> Self {
        self.keep_workdirs = keep;
        self
    }

    /// Places clone workspaces under `parent` instead of the system temp dir.
    pub fn with_workspace_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.workspace_parent = parent.into();
        self
    }

    /// Tag for `revision`, or the configured fallback when any step fails.
    pub async fn resolve_tag(&self, uri: &str, branch: &str, revision: &str) -> Option<String> {
        match self.describe_revision(uri, branch, revision).await {
            Ok(tag) => {
                info!(uri, tag = %tag, "Resolved tag");
                Some(tag)
            }
            Err(e) => {
                error!(uri, branch, revision, error = %e, "Tag resolution failed");
                let label = self.fallback.label(revision);
                if let Some(label) = &label {
                    info!(label = %label, "Using fallback tag");
                }
                label
            }
        }
    }

    /// Clone, checkout and describe without any fallback.
    pub async fn describe_revision(
        &self,
        uri: &str,
        branch: &str,
        revision: &str,
    ) -> Result<String, VcsError> {
        let workspace = CloneWorkspace::create_in(&self.workspace_parent, !self.keep_workdirs)?;
        info!(uri, branch, path = %workspace.path.display(), "Cloning");

        self.timed("clone", self.backend.clone_branch(uri, branch, &workspace.path))
            .await?;
        self.timed("checkout", self.backend.checkout(&workspace.path, revision))
            .await?;
        let tag = self
            .timed("describe", self.backend.describe(&workspace.path))
            .await?;

        // `workspace` drops here and removes the clone.
        Ok(tag)
    }

    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, VcsError>
    where
        F: std::future::Future<Output = Result<T, VcsError>>,
    {
        timeout(self.op_timeout, fut)
            .await
            .map_err(|_| VcsError::Timeout {
                op,
                timeout_secs: self.op_timeout.as_secs(),
            })?
    }
}
