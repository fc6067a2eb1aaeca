//! Collection sync: from changed ids to applied store writes.
//!
//! A run has two phases. Planning loads and validates every changed collection,
//! derives its stored projection and reconciles its memos; nothing is written
//! until the whole plan is built, so any invalid collection aborts the run with
//! the store untouched. Applying then issues four write groups concurrently:
//! collection projections, collection removals, memo upserts and memo
//! deletions. Each group commits in its own transaction(s); the groups are not
//! atomic with respect to each other.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{CollectionChanges, Memo, StoredCollection};
use crate::repositories::{LocalCollectionsRepository, MemosRepository, StoredCollectionsRepository};
use crate::schema;

use super::differ::ChangeDetector;
use super::extract::extract_ids;
use super::reconcile::{diff_memos, MemosDiff};

/// Every write a sync run will issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    /// Stored projections to set
    pub collections: Vec<StoredCollection>,
    /// Collections to delete together with their memos
    pub removed: Vec<String>,
    pub memo_upserts: BTreeMap<String, Vec<Memo>>,
    pub memo_deletions: BTreeMap<String, Vec<String>>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
            && self.removed.is_empty()
            && self.memo_upserts.is_empty()
            && self.memo_deletions.is_empty()
    }
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub dry_run: bool,
    pub collections_set: Vec<String>,
    pub collections_removed: Vec<String>,
    /// Upserted memo count per collection
    pub memo_upserts: BTreeMap<String, usize>,
    /// Deleted memo count per collection
    pub memo_deletions: BTreeMap<String, usize>,
    /// The unapplied plan, on dry runs only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<SyncPlan>,
}

impl SyncReport {
    fn from_plan(plan: &SyncPlan, dry_run: bool) -> Self {
        Self {
            dry_run,
            collections_set: plan.collections.iter().map(|c| c.id.clone()).collect(),
            collections_removed: plan.removed.clone(),
            memo_upserts: plan
                .memo_upserts
                .iter()
                .map(|(id, memos)| (id.clone(), memos.len()))
                .collect(),
            memo_deletions: plan
                .memo_deletions
                .iter()
                .map(|(id, ids)| (id.clone(), ids.len()))
                .collect(),
            plan: dry_run.then(|| plan.clone()),
        }
    }
}

/// Keeps stored collections and memos convergent with the local collection files.
#[derive(Clone)]
pub struct SyncCollections {
    detector: Arc<dyn ChangeDetector>,
    local: LocalCollectionsRepository,
    stored: StoredCollectionsRepository,
    memos: MemosRepository,
    dry_run: bool,
}

impl SyncCollections {
    pub fn new(
        detector: Arc<dyn ChangeDetector>,
        local: LocalCollectionsRepository,
        stored: StoredCollectionsRepository,
        memos: MemosRepository,
    ) -> Self {
        Self {
            detector,
            local,
            stored,
            memos,
            dry_run: false,
        }
    }

    /// Plan without writing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sync the collections changed since the last merge commit.
    pub async fn run(&self) -> Result<SyncReport, AppError> {
        let files = self.detector.changed_files().await?;
        let ids = extract_ids(&files);
        tracing::info!(
            added = ids.added.len(),
            updated = ids.updated.len(),
            removed = ids.removed.len(),
            "Collection changes extracted"
        );

        self.run_with_changes(ids.into()).await
    }

    /// Sync an explicit set of changed collection ids.
    pub async fn run_with_changes(&self, changes: CollectionChanges) -> Result<SyncReport, AppError> {
        let plan = self.plan(changes).await?;
        let report = SyncReport::from_plan(&plan, self.dry_run);

        if plan.is_empty() {
            tracing::info!("Nothing to sync");
            return Ok(report);
        }
        if self.dry_run {
            tracing::info!(
                collections_set = report.collections_set.len(),
                collections_removed = report.collections_removed.len(),
                "Dry run, no writes issued"
            );
            return Ok(report);
        }

        self.apply(&plan).await?;
        tracing::info!(
            collections_set = report.collections_set.len(),
            collections_removed = report.collections_removed.len(),
            memo_upserts = report.memo_upserts.values().sum::<usize>(),
            memo_deletions = report.memo_deletions.values().sum::<usize>(),
            "Sync completed"
        );
        Ok(report)
    }

    /// Build the full write plan for `changes` without touching the store's contents.
    pub async fn plan(&self, changes: CollectionChanges) -> Result<SyncPlan, AppError> {
        let changes = normalize(changes);
        let mut plan = SyncPlan {
            removed: changes.removed,
            ..Default::default()
        };

        if changes.added_or_updated.is_empty() {
            return Ok(plan);
        }

        let collections = self.local.get_collections_by_ids(&changes.added_or_updated).await?;
        for (requested_id, collection) in changes.added_or_updated.iter().zip(&collections) {
            if &collection.id != requested_id {
                return Err(AppError::Validation(format!(
                    "collection file \"{}.json\" declares id \"{}\"",
                    requested_id, collection.id
                )));
            }
            schema::validate(collection)?;
            let stored = collection.to_stored();
            schema::validate(&stored)?;
            plan.collections.push(stored);
        }

        let diffs = try_join_all(
            collections
                .iter()
                .map(|collection| diff_memos(&self.memos, &collection.id, &collection.memos)),
        )
        .await?;

        for (collection, diff) in collections.iter().zip(diffs) {
            if diff.is_empty() {
                tracing::debug!(collection = %collection.id, "Memos already up to date");
                continue;
            }
            let MemosDiff { upserts, deletions } = diff;
            if !upserts.is_empty() {
                plan.memo_upserts.insert(collection.id.clone(), upserts);
            }
            if !deletions.is_empty() {
                plan.memo_deletions.insert(collection.id.clone(), deletions);
            }
        }

        Ok(plan)
    }

    /// Issue the four write groups of `plan` concurrently. Empty groups are skipped.
    pub async fn apply(&self, plan: &SyncPlan) -> Result<(), AppError> {
        let set_collections = async {
            if plan.collections.is_empty() {
                return Ok(());
            }
            self.stored.set_collections(&plan.collections).await
        };
        let delete_collections = async {
            if plan.removed.is_empty() {
                return Ok(());
            }
            self.stored.delete_collections_by_ids(&plan.removed).await
        };
        let set_memos = async {
            if plan.memo_upserts.is_empty() {
                return Ok(());
            }
            self.memos.set_memos(&plan.memo_upserts).await
        };
        let remove_memos = async {
            if plan.memo_deletions.is_empty() {
                return Ok(());
            }
            self.memos.remove_memos_by_ids(&plan.memo_deletions).await
        };

        futures::try_join!(set_collections, delete_collections, set_memos, remove_memos)?;
        Ok(())
    }
}

/// Drop repeated ids, keeping first occurrences, and never remove an id that is also being written.
fn normalize(changes: CollectionChanges) -> CollectionChanges {
    let added_or_updated = dedupe(changes.added_or_updated);
    let removed = dedupe(changes.removed)
        .into_iter()
        .filter(|id| {
            let conflicting = added_or_updated.contains(id);
            if conflicting {
                tracing::warn!(collection_id = %id, "Collection is both written and removed, keeping the write");
            }
            !conflicting
        })
        .collect();

    CollectionChanges {
        added_or_updated,
        removed,
    }
}

fn dedupe(ids: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}
