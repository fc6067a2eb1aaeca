//! Git queries over the shell gateway.

use std::sync::Arc;

use crate::errors::AppError;
use crate::gateways::ShellGateway;

/// Resolves revisions and diffs them with the `git` executable.
#[derive(Clone)]
pub struct GitRepository {
    shell: Arc<dyn ShellGateway>,
}

impl GitRepository {
    pub fn new(shell: Arc<dyn ShellGateway>) -> Self {
        Self { shell }
    }

    /// Hash of the current `HEAD` commit.
    pub async fn last_commit_hash(&self) -> Result<String, AppError> {
        let output = self.shell.run("git", &["rev-parse", "HEAD"]).await?;
        Ok(output.trim().to_string())
    }

    /// Hash of the most recent merge commit reachable from `HEAD`.
    pub async fn last_merge_commit_hash(&self) -> Result<String, AppError> {
        let output = self
            .shell
            .run("git", &["log", "--merges", "-n", "1", "--format=%H"])
            .await?;
        let hash = output.trim();
        if hash.is_empty() {
            return Err(AppError::Shell {
                command: "git log --merges -n 1 --format=%H".to_string(),
                detail: "no merge commit found on the current branch".to_string(),
            });
        }
        Ok(hash.to_string())
    }

    /// Raw `git diff` output between `base` and `head`.
    pub async fn git_diff(&self, base: &str, head: &str, name_status: bool) -> Result<String, AppError> {
        let mut args = vec!["diff"];
        if name_status {
            args.push("--name-status");
        }
        args.push(base);
        args.push(head);

        self.shell.run("git", &args).await
    }
}
