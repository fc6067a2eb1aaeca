//! Filesystem access.

use std::path::{Path, PathBuf};

use crate::errors::AppError;

/// Reads files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileSystemGateway {
    root: PathBuf,
}

impl FileSystemGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read a UTF-8 file relative to the root.
    pub async fn read_file_as_string(&self, file: impl AsRef<Path>) -> Result<String, AppError> {
        let path = self.root.join(file);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AppError::filesystem("Failed to read file", path, e))
    }

    /// List the names of files in `dir` (relative to the root) with the given extension, sorted.
    pub async fn list_files(&self, dir: impl AsRef<Path>, extension: &str) -> Result<Vec<String>, AppError> {
        let path = self.root.join(dir);
        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| AppError::filesystem("Failed to read files in directory", &path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::filesystem("Failed to read files in directory", &path, e))?
        {
            let entry_path = entry.path();
            if !entry_path.is_file() || entry_path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
                continue;
            }
            if let Some(name) = entry_path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}
