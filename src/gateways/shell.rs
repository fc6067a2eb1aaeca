//! Shell access.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::AppError;

/// Runs external programs and returns their decoded standard output.
#[async_trait]
pub trait ShellGateway: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, AppError>;
}

/// [`ShellGateway`] that spawns real processes in a fixed working directory.
pub struct ProcessShell {
    working_dir: PathBuf,
}

impl ProcessShell {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl ShellGateway for ProcessShell {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, AppError> {
        let command = format!("{} {}", program, args.join(" "));
        tracing::debug!(%command, "Running shell command");

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| AppError::Shell {
                command: command.clone(),
                detail: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(AppError::Shell {
                command,
                detail: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }
        // Anything written to stderr counts as a failure, even with a zero exit status
        if !stderr.trim().is_empty() {
            return Err(AppError::Shell {
                command,
                detail: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
