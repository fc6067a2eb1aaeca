//! End-to-end tests for the sync pipeline.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::{Config, LogFormat};
use crate::db::{init_database, DocumentStore, StorePath};
use crate::errors::AppError;
use crate::gateways::ShellGateway;
use crate::models::{CollectionChanges, UpdatedCollections};
use crate::provider::Provider;
use crate::sync::{extract_ids, ChangeDetector};

/// Answers the three git commands of a sync with a scripted diff.
struct ScriptedGit {
    diff: Mutex<Result<String, String>>,
}

impl ScriptedGit {
    fn set_diff(&self, diff: &str) {
        *self.diff.lock().unwrap() = Ok(diff.to_string());
    }

    fn fail_with(&self, stderr: &str) {
        *self.diff.lock().unwrap() = Err(stderr.to_string());
    }
}

#[async_trait]
impl ShellGateway for ScriptedGit {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, AppError> {
        assert_eq!(program, "git");
        match args.first().copied() {
            Some("rev-parse") => Ok("2222222\n".to_string()),
            Some("log") => Ok("1111111\n".to_string()),
            Some("diff") => self.diff.lock().unwrap().clone().map_err(|detail| AppError::Shell {
                command: format!("git {}", args.join(" ")),
                detail,
            }),
            _ => panic!("unexpected git invocation: {:?}", args),
        }
    }
}

/// Test fixture for end-to-end sync runs.
struct TestFixture {
    provider: Provider,
    store: DocumentStore,
    git: Arc<ScriptedGit>,
    pool: SqlitePool,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_transaction_limit(499).await
    }

    async fn with_transaction_limit(transaction_limit: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let collections_dir = temp_dir.path().join("collections");
        std::fs::create_dir(&collections_dir).expect("Failed to create collections dir");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let store = DocumentStore::new(pool.clone(), transaction_limit);

        let config = Config {
            db_path,
            collections_dir,
            collections_segment: "collections".to_string(),
            repo_dir: temp_dir.path().to_path_buf(),
            transaction_limit,
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
            updated_collections: None,
        };

        let git = Arc::new(ScriptedGit {
            diff: Mutex::new(Ok(String::new())),
        });
        let provider = Provider::with_collaborators(config, store.clone(), git.clone());

        TestFixture {
            provider,
            store,
            git,
            pool,
            temp_dir,
        }
    }

    fn write_collection(&self, id: &str, memos: &[(&str, &str)]) {
        self.write_raw(id, collection_json(id, memos));
    }

    fn write_raw(&self, id: &str, raw: Value) {
        let path = self.temp_dir.path().join("collections").join(format!("{}.json", id));
        std::fs::write(path, serde_json::to_string_pretty(&raw).unwrap()).unwrap();
    }

    fn remove_collection(&self, id: &str) {
        let path = self.temp_dir.path().join("collections").join(format!("{}.json", id));
        std::fs::remove_file(path).unwrap();
    }

    async fn stored_collection(&self, id: &str) -> Option<Value> {
        self.store
            .get_doc(&StorePath::Collections, id)
            .await
            .unwrap()
    }

    async fn stored_memo_ids(&self, collection_id: &str) -> Vec<String> {
        self.store
            .get_collection(&StorePath::CollectionMemos(collection_id.to_string()), &[])
            .await
            .unwrap()
            .into_iter()
            .map(|memo| memo["id"].as_str().unwrap().to_string())
            .collect()
    }

    /// Every row of the documents table, timestamps included.
    async fn snapshot(&self) -> Vec<(String, String, String, String)> {
        sqlx::query_as(
            "SELECT collection_path, id, data, updated_at FROM documents ORDER BY collection_path, id",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap()
    }
}

fn collection_json(id: &str, memos: &[(&str, &str)]) -> Value {
    let memos: Vec<Value> = memos
        .iter()
        .map(|(memo_id, answer)| {
            json!({
                "id": memo_id,
                "question": [{ "insert": format!("What is {}?", memo_id) }],
                "answer": [{ "insert": answer, "attributes": { "bold": true } }],
            })
        })
        .collect();

    json!({
        "id": id,
        "name": format!("Collection {}", id),
        "description": "A collection used by the sync tests",
        "tags": ["testing"],
        "category": "Programming",
        "contributors": [{ "name": "tester", "url": "https://example.com", "avatarUrl": "https://example.com/avatar.png" }],
        "resources": [{ "type": "book", "description": "Reference", "url": "https://example.com/book" }],
        "memos": memos,
    })
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

// ============================================================================
// Git-driven sync
// ============================================================================

#[tokio::test]
async fn test_added_collection_is_projected_with_its_memos() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("rust", &[("m1", "ownership"), ("m2", "borrowing")]);
    fixture.git.set_diff("A\tcollections/rust.json\nM\tREADME.md\n");

    let report = fixture.provider.sync_collections().await.unwrap().run().await.unwrap();
    assert_eq!(report.collections_set, ids(&["rust"]));
    assert_eq!(report.memo_upserts.get("rust"), Some(&2));
    assert!(report.memo_deletions.is_empty());

    let stored = fixture.stored_collection("rust").await.unwrap();
    assert_eq!(stored["memosAmount"], 2);
    assert_eq!(stored["memosOrder"], json!(["m1", "m2"]));
    assert!(stored.get("memos").is_none());
    assert_eq!(fixture.stored_memo_ids("rust").await, ids(&["m1", "m2"]));
}

#[tokio::test]
async fn test_second_run_without_changes_is_idempotent() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("rust", &[("m1", "ownership"), ("m2", "borrowing")]);
    fixture.git.set_diff("M\tcollections/rust.json\n");

    let sync = fixture.provider.sync_collections().await.unwrap();
    sync.run().await.unwrap();
    let first = fixture.snapshot().await;

    let report = sync.run().await.unwrap();
    assert!(report.memo_upserts.is_empty());
    assert!(report.memo_deletions.is_empty());
    assert_eq!(fixture.snapshot().await, first);
}

#[tokio::test]
async fn test_removed_memo_shrinks_order_and_is_deleted() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("rust", &[("m1", "ownership"), ("m2", "borrowing")]);
    fixture.git.set_diff("A\tcollections/rust.json\n");
    let sync = fixture.provider.sync_collections().await.unwrap();
    sync.run().await.unwrap();

    fixture.write_collection("rust", &[("m1", "ownership")]);
    fixture.git.set_diff("M\tcollections/rust.json\n");
    let report = sync.run().await.unwrap();

    assert_eq!(report.memo_deletions.get("rust"), Some(&1));
    assert!(report.memo_upserts.is_empty());

    let stored = fixture.stored_collection("rust").await.unwrap();
    assert_eq!(stored["memosAmount"], 1);
    assert_eq!(stored["memosOrder"], json!(["m1"]));
    assert_eq!(fixture.stored_memo_ids("rust").await, ids(&["m1"]));
}

#[tokio::test]
async fn test_rename_deletes_old_collection_and_loads_new_one() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("a", &[("m1", "one")]);
    fixture.git.set_diff("A\tcollections/a.json\n");
    let sync = fixture.provider.sync_collections().await.unwrap();
    sync.run().await.unwrap();

    fixture.remove_collection("a");
    fixture.write_collection("b", &[("m1", "one")]);
    fixture.git.set_diff("R100\tcollections/a.json\tcollections/b.json\n");
    let report = sync.run().await.unwrap();

    assert_eq!(report.collections_removed, ids(&["a"]));
    assert_eq!(report.collections_set, ids(&["b"]));
    assert!(fixture.stored_collection("a").await.is_none());
    assert!(fixture.stored_memo_ids("a").await.is_empty());
    assert!(fixture.stored_collection("b").await.is_some());
    assert_eq!(fixture.stored_memo_ids("b").await, ids(&["m1"]));
}

#[tokio::test]
async fn test_removed_collection_memos_go_with_the_cascade() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("a", &[("m1", "one"), ("m2", "two")]);
    fixture.git.set_diff("A\tcollections/a.json\n");
    let sync = fixture.provider.sync_collections().await.unwrap();
    sync.run().await.unwrap();

    fixture.remove_collection("a");
    let plan = sync
        .plan(CollectionChanges {
            added_or_updated: vec![],
            removed: ids(&["a"]),
        })
        .await
        .unwrap();
    // No memo deletion is planned for a collection that is removed as a whole
    assert!(plan.memo_deletions.is_empty());
    assert_eq!(plan.removed, ids(&["a"]));

    sync.apply(&plan).await.unwrap();
    assert!(fixture.stored_collection("a").await.is_none());
    assert!(fixture.stored_memo_ids("a").await.is_empty());
}

#[tokio::test]
async fn test_invalid_collection_blocks_every_write() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("good", &[("m1", "one")]);
    let mut broken = collection_json("broken", &[("m1", "one")]);
    broken.as_object_mut().unwrap().remove("category");
    fixture.write_raw("broken", broken);
    fixture.git.set_diff("A\tcollections/good.json\nA\tcollections/broken.json\n");

    let result = fixture.provider.sync_collections().await.unwrap().run().await;
    match result {
        Err(AppError::Serialization { schema, .. }) => assert_eq!(schema, "local-public-collection"),
        other => panic!("expected a serialization error, got {:?}", other),
    }
    assert!(fixture.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_mismatched_file_name_blocks_every_write() {
    let fixture = TestFixture::new().await;
    fixture.write_raw("alias", collection_json("real", &[("m1", "one")]));
    fixture.git.set_diff("A\tcollections/alias.json\n");

    let result = fixture.provider.sync_collections().await.unwrap().run().await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(fixture.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_failing_git_aborts_the_run() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("rust", &[("m1", "one")]);
    fixture.git.fail_with("fatal: bad revision '1111111'");

    let result = fixture.provider.sync_collections().await.unwrap().run().await;
    match result {
        Err(err) => assert_eq!(err.error_code(), "SHELL_ERROR"),
        Ok(report) => panic!("expected the run to fail, got {:?}", report),
    }
    assert!(fixture.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("rust", &[("m1", "one")]);
    fixture.git.set_diff("A\tcollections/rust.json\n");

    let report = fixture.provider.sync_collections().await.unwrap().dry_run(true).run().await.unwrap();
    assert!(report.dry_run);
    let plan = report.plan.expect("dry run carries its plan");
    assert_eq!(plan.collections.len(), 1);
    assert_eq!(plan.memo_upserts["rust"].len(), 1);
    assert!(fixture.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_collection_with_underscore_id_is_added_then_removed() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("rust_basics", &[("m1", "ownership"), ("m2", "borrowing")]);
    fixture.git.set_diff("A\tcollections/rust_basics.json\n");
    let sync = fixture.provider.sync_collections().await.unwrap();

    let report = sync.run().await.unwrap();
    assert_eq!(report.collections_set, ids(&["rust_basics"]));
    assert_eq!(fixture.stored_memo_ids("rust_basics").await, ids(&["m1", "m2"]));

    fixture.remove_collection("rust_basics");
    fixture.git.set_diff("D\tcollections/rust_basics.json\n");
    let report = sync.run().await.unwrap();

    assert_eq!(report.collections_removed, ids(&["rust_basics"]));
    assert!(fixture.stored_collection("rust_basics").await.is_none());
    assert!(fixture.stored_memo_ids("rust_basics").await.is_empty());
    assert!(fixture.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_diff_output_is_the_updated_collections_payload() {
    let fixture = TestFixture::new().await;
    fixture
        .git
        .set_diff("A\tcollections/new deck.json\nM\tcollections/rust.json\nD\tcollections/old_deck.json\nM\tREADME.md\n");

    let files = fixture.provider.revision_differ().changed_files().await.unwrap();
    let payload = serde_json::to_value(extract_ids(&files)).unwrap();
    assert_eq!(
        payload,
        json!({ "added": ["new deck"], "updated": ["rust"], "removed": ["old_deck"] })
    );

    // The printed payload is accepted back by `sync --from-env`
    let parsed = UpdatedCollections::from_env_payload(Some(&payload.to_string())).unwrap();
    assert_eq!(parsed, extract_ids(&files));
}

#[test]
fn test_second_log_subscriber_is_rejected() {
    let _ = crate::init_logging("warn", LogFormat::Text);
    match crate::init_logging("warn", LogFormat::Json) {
        Err(AppError::Other(message)) => assert!(message.contains("log subscriber")),
        other => panic!("expected the second subscriber to be rejected, got {:?}", other),
    }
}

// ============================================================================
// Explicit ids
// ============================================================================

#[tokio::test]
async fn test_explicit_ids_bypass_git() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("a", &[("m1", "one")]);
    fixture.write_collection("b", &[("m1", "one")]);
    // Any git call would be answered with a failure
    fixture.git.fail_with("git must not be called");

    let changes: UpdatedCollections =
        serde_json::from_str(r#"{"added": ["a"], "updated": ["b"], "removed": []}"#).unwrap();
    let report = fixture
        .provider
        .sync_collections().await.unwrap()
        .run_with_changes(changes.into())
        .await
        .unwrap();

    assert_eq!(report.collections_set, ids(&["a", "b"]));
    assert!(fixture.stored_collection("a").await.is_some());
    assert!(fixture.stored_collection("b").await.is_some());
}

#[tokio::test]
async fn test_large_collections_are_written_in_several_transactions() {
    let fixture = TestFixture::with_transaction_limit(3).await;
    let memo_ids: Vec<String> = (0..10).map(|i| format!("m{:02}", i)).collect();
    let memos: Vec<(&str, &str)> = memo_ids.iter().map(|id| (id.as_str(), "answer")).collect();
    fixture.write_collection("big", &memos);

    let report = fixture
        .provider
        .sync_collections().await.unwrap()
        .run_with_changes(CollectionChanges {
            added_or_updated: ids(&["big"]),
            removed: vec![],
        })
        .await
        .unwrap();

    assert_eq!(report.memo_upserts.get("big"), Some(&10));
    assert_eq!(fixture.stored_memo_ids("big").await, memo_ids);
}

#[tokio::test]
async fn test_inspect_skips_unknown_ids() {
    let fixture = TestFixture::new().await;
    fixture.write_collection("a", &[("m1", "one")]);
    fixture
        .provider
        .sync_collections().await.unwrap()
        .run_with_changes(CollectionChanges {
            added_or_updated: ids(&["a"]),
            removed: vec![],
        })
        .await
        .unwrap();

    let stored = fixture
        .provider
        .stored_collections_repository()
        .await
        .unwrap()
        .get_collections_by_ids(&ids(&["missing", "a"]))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].memos_order, ids(&["m1"]));
}
