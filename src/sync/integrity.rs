//! Integrity check over the whole local collection corpus.

use std::collections::HashMap;

use futures::future::join_all;
use serde::Serialize;

use crate::errors::AppError;
use crate::repositories::LocalCollectionsRepository;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub checked: usize,
    pub problems: Vec<String>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Load every collection file and report every problem found, rather than the first.
///
/// Checks that each file parses against the local schema (which also covers memo id
/// uniqueness), that its `id` matches the file stem, and that no two files declare
/// the same collection id.
pub async fn check_corpus(local: &LocalCollectionsRepository) -> Result<IntegrityReport, AppError> {
    let file_ids = local.list_ids().await?;
    let results = join_all(file_ids.iter().map(|id| local.get_collection_by_id(id))).await;

    let mut report = IntegrityReport {
        checked: file_ids.len(),
        problems: Vec::new(),
    };
    let mut declared: HashMap<String, &str> = HashMap::new();

    for (file_id, result) in file_ids.iter().zip(results) {
        let collection = match result {
            Ok(collection) => collection,
            Err(err) => {
                report.problems.push(format!("{}.json: {}", file_id, err));
                continue;
            }
        };

        if &collection.id != file_id {
            report.problems.push(format!(
                "{}.json: declared id \"{}\" does not match the file name",
                file_id, collection.id
            ));
        }
        if let Some(first) = declared.insert(collection.id.clone(), file_id) {
            report.problems.push(format!(
                "{}.json: collection id \"{}\" is already declared by {}.json",
                file_id, collection.id, first
            ));
        }
    }

    for problem in &report.problems {
        tracing::warn!(%problem, "Integrity problem");
    }
    tracing::info!(checked = report.checked, problems = report.problems.len(), "Corpus checked");
    Ok(report)
}
