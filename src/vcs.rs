//! `git` command-line backend for [`VcsBackend`].

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::traits::{VcsBackend, VcsError};

/// Runs the system `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// Uses a different executable, e.g. an absolute path to `git`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run<I, S>(
        &self,
        op: &'static str,
        cwd: Option<&Path>,
        args: I,
    ) -> Result<String, VcsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            // A credential prompt would block the run forever.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!(op, "Running git");
        let output = cmd.output().await?;

        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                op,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

/// `git clone` arguments; `--` keeps a URI starting with `-` from being read as an option.
fn clone_args<'a>(uri: &'a str, branch: &'a str, dest: &'a Path) -> Vec<&'a OsStr> {
    vec![
        OsStr::new("clone"),
        OsStr::new("--branch"),
        OsStr::new(branch),
        OsStr::new("--"),
        OsStr::new(uri),
        dest.as_os_str(),
    ]
}

fn checkout_args(revision: &str) -> [&str; 3] {
    ["checkout", "--end-of-options", revision]
}

#[async_trait]
impl VcsBackend for GitCli {
    async fn clone_branch(&self, uri: &str, branch: &str, dest: &Path) -> Result<(), VcsError> {
        self.run("clone", None, clone_args(uri, branch, dest))
            .await
            .map(|_| ())
    }

    async fn checkout(&self, workdir: &Path, revision: &str) -> Result<(), VcsError> {
        self.run("checkout", Some(workdir), checkout_args(revision))
            .await
            .map(|_| ())
    }

    async fn describe(&self, workdir: &Path) -> Result<String, VcsError> {
        self.run("describe", Some(workdir), ["describe", "--tags"])
            .await
    }
}
