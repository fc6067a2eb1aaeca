//! Change detection between two revisions of the collections directory.

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{ChangeKind, ChangedFile};
use crate::repositories::GitRepository;

/// Source of changed collection files since the last sync.
#[async_trait]
pub trait ChangeDetector: Send + Sync {
    async fn changed_files(&self) -> Result<Vec<ChangedFile>, AppError>;
}

/// Detects changes with `git diff --name-status` between the last merge commit and `HEAD`.
#[derive(Clone)]
pub struct GitRevisionDiffer {
    git: GitRepository,
    segment: String,
}

impl GitRevisionDiffer {
    /// `segment` is the repository-relative directory name holding collection files.
    pub fn new(git: GitRepository, segment: impl Into<String>) -> Self {
        Self {
            git,
            segment: segment.into(),
        }
    }

    /// Changed collection files between two revisions.
    pub async fn diff(&self, base: &str, head: &str) -> Result<Vec<ChangedFile>, AppError> {
        let output = self.git.git_diff(base, head, true).await?;
        Ok(parse_name_status(&output, &self.segment))
    }
}

#[async_trait]
impl ChangeDetector for GitRevisionDiffer {
    async fn changed_files(&self) -> Result<Vec<ChangedFile>, AppError> {
        let (head, base) = futures::try_join!(self.git.last_commit_hash(), self.git.last_merge_commit_hash())?;
        tracing::info!(%base, %head, "Diffing collections between revisions");

        let files = self.diff(&base, &head).await?;
        tracing::info!(count = files.len(), "Changed collection files detected");
        Ok(files)
    }
}

/// Parse `git diff --name-status` output, keeping only files under `segment`.
///
/// Records are tab separated, so paths may contain spaces. Lines without a tab
/// are split on whitespace instead. A rename that moves a file across the
/// segment boundary is reported as the deletion or addition it amounts to for
/// the collections directory.
pub fn parse_name_status(output: &str, segment: &str) -> Vec<ChangedFile> {
    let mut files = Vec::new();

    for line in output.lines() {
        let fields: Vec<&str> = if line.contains('\t') {
            line.split('\t').filter(|field| !field.is_empty()).collect()
        } else {
            line.split_whitespace().collect()
        };
        let (status, paths) = match fields.split_first() {
            Some((status, paths)) => (*status, paths),
            None => continue,
        };
        let Some(&path) = paths.first() else {
            tracing::warn!(line, "Skipping diff line without a path");
            continue;
        };

        match status.chars().next() {
            Some('A') | Some('C') => {
                let target = paths.last().copied().unwrap_or(path);
                push_if_tracked(&mut files, segment, ChangeKind::Added, target)
            }
            Some('M') | Some('T') => push_if_tracked(&mut files, segment, ChangeKind::Modified, path),
            Some('D') => push_if_tracked(&mut files, segment, ChangeKind::Deleted, path),
            Some('R') => {
                let Some(&to) = paths.get(1) else {
                    tracing::warn!(line, "Skipping rename without a target path");
                    continue;
                };
                match (is_tracked(path, segment), is_tracked(to, segment)) {
                    (true, true) => files.push(ChangedFile::renamed(path, to)),
                    (true, false) => files.push(ChangedFile::new(ChangeKind::Deleted, path)),
                    (false, true) => files.push(ChangedFile::new(ChangeKind::Added, to)),
                    (false, false) => {}
                }
            }
            _ => tracing::warn!(line, "Skipping diff line with unknown status"),
        }
    }

    files
}

fn push_if_tracked(files: &mut Vec<ChangedFile>, segment: &str, kind: ChangeKind, path: &str) {
    if is_tracked(path, segment) {
        files.push(ChangedFile::new(kind, path));
    }
}

fn is_tracked(path: &str, segment: &str) -> bool {
    let prefix = format!("{}/", segment);
    path.starts_with(&prefix) || path.contains(&format!("/{}", prefix))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gateways::ShellGateway;

    #[test]
    fn test_parses_statuses_inside_segment() {
        let output = "A\tcollections/x.json\nM\tcollections/y.json\nD\tcollections/z.json\nM\tREADME.md\n";
        let files = parse_name_status(output, "collections");

        assert_eq!(
            files,
            vec![
                ChangedFile::new(ChangeKind::Added, "collections/x.json"),
                ChangedFile::new(ChangeKind::Modified, "collections/y.json"),
                ChangedFile::new(ChangeKind::Deleted, "collections/z.json"),
            ]
        );
    }

    #[test]
    fn test_rename_is_a_single_record() {
        let files = parse_name_status("R100\tcollections/a.json\tcollections/b.json", "collections");
        assert_eq!(files, vec![ChangedFile::renamed("collections/a.json", "collections/b.json")]);

        let spaced = parse_name_status("R collections/a.json collections/b.json", "collections");
        assert_eq!(spaced, files);
    }

    #[test]
    fn test_rename_across_segment_boundary() {
        let out = parse_name_status("R090\tcollections/a.json\tarchive/a.json", "collections");
        assert_eq!(out, vec![ChangedFile::new(ChangeKind::Deleted, "collections/a.json")]);

        let back = parse_name_status("R090\tarchive/a.json\tcollections/a.json", "collections");
        assert_eq!(back, vec![ChangedFile::new(ChangeKind::Added, "collections/a.json")]);
    }

    #[test]
    fn test_tab_separated_paths_keep_their_spaces() {
        let output = "A\tcollections/go basics.json\nR100\tcollections/old deck.json\tcollections/new deck.json\n";
        let files = parse_name_status(output, "collections");
        assert_eq!(
            files,
            vec![
                ChangedFile::new(ChangeKind::Added, "collections/go basics.json"),
                ChangedFile::renamed("collections/old deck.json", "collections/new deck.json"),
            ]
        );
    }

    #[test]
    fn test_nested_segment_and_lookalikes() {
        let output = "A\tdata/collections/x.json\nA\tmycollections/y.json\nA\tcollections.json\n\n";
        let files = parse_name_status(output, "collections");
        assert_eq!(files, vec![ChangedFile::new(ChangeKind::Added, "data/collections/x.json")]);
    }

    struct ScriptedShell;

    #[async_trait]
    impl ShellGateway for ScriptedShell {
        async fn run(&self, _program: &str, args: &[&str]) -> Result<String, AppError> {
            match args {
                ["rev-parse", "HEAD"] => Ok("head-hash\n".to_string()),
                ["log", ..] => Ok("merge-hash\n".to_string()),
                ["diff", "--name-status", "merge-hash", "head-hash"] => {
                    Ok("A\tcollections/x.json\nD\tcollections/y.json\n".to_string())
                }
                other => Err(AppError::Shell {
                    command: other.join(" "),
                    detail: "unexpected command".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_diffs_last_merge_against_head() {
        let differ = GitRevisionDiffer::new(GitRepository::new(Arc::new(ScriptedShell)), "collections");
        let files = differ.changed_files().await.unwrap();

        assert_eq!(
            files,
            vec![
                ChangedFile::new(ChangeKind::Added, "collections/x.json"),
                ChangedFile::new(ChangeKind::Deleted, "collections/y.json"),
            ]
        );
    }
}
