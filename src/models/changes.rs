//! Change-feed models shared by the revision differ and the sync orchestrator.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// How a file changed between two revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    /// Carries the previous path; the record's own `path` is the new one.
    Renamed { from: String },
}

/// A single changed file, as reported by a change detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: String,
    pub kind: ChangeKind,
}

impl ChangedFile {
    pub fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn renamed(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            path: to.into(),
            kind: ChangeKind::Renamed { from: from.into() },
        }
    }
}

/// Collection ids bucketed by what happened to them since the last sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedCollections {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub updated: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

impl UpdatedCollections {
    /// Parse the `{added, updated, removed}` payload of the explicit-ids entry point.
    ///
    /// Missing keys count as empty lists. `None` means the variable was never set.
    pub fn from_env_payload(raw: Option<&str>) -> Result<Self, AppError> {
        let raw = raw.ok_or_else(|| {
            AppError::Config("MEMO_UPDATED_COLLECTIONS must be set when syncing with --from-env".to_string())
        })?;

        serde_json::from_str(raw).map_err(|err| AppError::Serialization {
            schema: "updated-collections".to_string(),
            details: vec![err.to_string()],
        })
    }
}

/// Explicit input of the orchestrator, bypassing change detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionChanges {
    pub added_or_updated: Vec<String>,
    pub removed: Vec<String>,
}

impl From<UpdatedCollections> for CollectionChanges {
    fn from(updated: UpdatedCollections) -> Self {
        let mut added_or_updated = updated.added;
        added_or_updated.extend(updated.updated);

        Self {
            added_or_updated,
            removed: updated.removed,
        }
    }
}
