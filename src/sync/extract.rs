//! Mapping of changed file paths to collection ids.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ChangeKind, ChangedFile, UpdatedCollections};

static RENAMED_FILE: OnceLock<Regex> = OnceLock::new();

/// Collection id of a `<id>.json` path: the file name without directory and extension.
pub fn collection_id(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name
        .strip_suffix(".json")
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Collection id of one side of a rename.
///
/// The stem is matched against the id pattern first; stems outside it still map
/// to their plain file stem so the rename is never lost.
fn renamed_collection_id(path: &str) -> Option<String> {
    let re = RENAMED_FILE.get_or_init(|| Regex::new(r"([A-Za-z0-9+-]+)\.json$").expect("Invalid regex pattern"));
    let file_name = path.rsplit('/').next().unwrap_or(path);

    re.captures(file_name)
        .filter(|captures| captures.get(0).is_some_and(|m| m.start() == 0))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| collection_id(path))
}

/// Bucket changed files into added, updated and removed collection ids, in input order.
///
/// A rename removes the old id and adds the new one.
pub fn extract_ids(files: &[ChangedFile]) -> UpdatedCollections {
    let mut ids = UpdatedCollections::default();

    for file in files {
        match &file.kind {
            ChangeKind::Added => push_id(&mut ids.added, collection_id(&file.path), &file.path),
            ChangeKind::Modified => push_id(&mut ids.updated, collection_id(&file.path), &file.path),
            ChangeKind::Deleted => push_id(&mut ids.removed, collection_id(&file.path), &file.path),
            ChangeKind::Renamed { from } => {
                push_id(&mut ids.removed, renamed_collection_id(from), from);
                push_id(&mut ids.added, renamed_collection_id(&file.path), &file.path);
            }
        }
    }

    ids
}

fn push_id(bucket: &mut Vec<String>, id: Option<String>, path: &str) {
    match id {
        Some(id) => bucket.push(id),
        None => tracing::warn!(path, "Ignoring changed file that is not a collection document"),
    }
}
