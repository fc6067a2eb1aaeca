//! Memo reconciliation between a local collection and its stored memos.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::errors::AppError;
use crate::models::Memo;
use crate::repositories::MemosRepository;
use crate::schema;

/// Writes needed to make the stored memos of one collection match the local ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemosDiff {
    pub upserts: Vec<Memo>,
    pub deletions: Vec<String>,
}

impl MemosDiff {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty()
    }
}

/// Compare local memos against what is stored for `collection_id`.
///
/// A local memo is upserted when it is missing from the store or differs from
/// the stored one in any field. A stored memo with no local counterpart is deleted.
/// Upserts keep local order, deletions keep stored order.
pub async fn diff_memos(
    memos: &MemosRepository,
    collection_id: &str,
    local_memos: &[Memo],
) -> Result<MemosDiff, AppError> {
    for memo in local_memos {
        schema::validate(memo)?;
    }

    let stored_memos = memos.get_all_memos(collection_id).await?;
    let diff = compute_diff(local_memos, &stored_memos);

    tracing::debug!(
        collection_id,
        upserts = diff.upserts.len(),
        deletions = diff.deletions.len(),
        "Memos reconciled"
    );
    Ok(diff)
}

fn compute_diff(local_memos: &[Memo], stored_memos: &[Memo]) -> MemosDiff {
    let stored_by_id: HashMap<&str, &Memo> = stored_memos.iter().map(|memo| (memo.id.as_str(), memo)).collect();
    let local_ids: HashSet<&str> = local_memos.iter().map(|memo| memo.id.as_str()).collect();

    let upserts = local_memos
        .iter()
        .filter(|memo| stored_by_id.get(memo.id.as_str()) != Some(memo))
        .cloned()
        .collect();
    let deletions = stored_memos
        .iter()
        .filter(|memo| !local_ids.contains(memo.id.as_str()))
        .map(|memo| memo.id.clone())
        .collect();

    MemosDiff { upserts, deletions }
}
