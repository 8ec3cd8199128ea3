//! Bulk maintenance over items produced by real runs.

use std::sync::Arc;

use bulkgen::config::RemoteSettings;
use bulkgen::error::{RunError, StorageError};
use bulkgen::generation::{generate, CancelFlag, GenerateRequest, HookRegistry, RunEnvironment};
use bulkgen::items::{GeneratedItem, ItemStatus, ItemStore, ItemWrite};
use bulkgen::job::GenerationSettings;
use bulkgen::maintenance::{
    BulkMaintenanceOperation, ItemLimit, MaintenanceAction, MaintenanceRequest,
};
use bulkgen::storage::RunStores;
use bulkgen::types::JobKind;

use crate::integration::test_utils::{catalog, definition};

fn environment() -> RunEnvironment {
    RunEnvironment {
        catalog: catalog(vec![
            definition("blog", JobKind::Content, 6),
            definition("regions", JobKind::Terms, 4),
        ]),
        stores: RunStores::temporary(3600).unwrap(),
        registry: HookRegistry::with_builtins(),
        settings: GenerationSettings {
            retry_pause_ms: 0,
            step_size: 3,
            ..GenerationSettings::default()
        },
        remote: RemoteSettings::default(),
        keep_runs: 0,
        cancel: CancelFlag::new(),
    }
}

async fn generate_all(env: &RunEnvironment, kind: JobKind, job_id: &str) {
    generate(env, &GenerateRequest::new(kind, job_id)).await.unwrap();
}

#[tokio::test]
async fn test_trash_skips_excluded_and_respects_limit() {
    let env = environment();
    generate_all(&env, JobKind::Content, "blog").await;
    let items = env.stores.items.list_for_job("blog").unwrap();
    assert_eq!(items.len(), 6);
    let keep = items[1].id;

    let operation = BulkMaintenanceOperation::new(env.stores.items.clone());
    let report = operation
        .run(
            &MaintenanceRequest::new("blog", MaintenanceAction::Trash)
                .with_limit(ItemLimit::Bounded(3))
                .excluding([keep]),
        )
        .unwrap();

    assert_eq!(report.count_affected, 3);
    assert_eq!(report.skipped_excluded, 1);
    assert!(!report.affected_ids.contains(&keep));
    assert_eq!(
        env.stores.items.count_for_job("blog", ItemStatus::Trashed).unwrap(),
        3
    );
    assert_eq!(
        env.stores.items.get(keep).unwrap().unwrap().status,
        ItemStatus::Published
    );

    let again = operation
        .run(&MaintenanceRequest::new("blog", MaintenanceAction::Trash).excluding([keep]))
        .unwrap();
    assert_eq!(again.count_affected, 2, "trashed items are not trashed twice");
}

#[tokio::test]
async fn test_delete_dry_run_changes_nothing() {
    let env = environment();
    generate_all(&env, JobKind::Terms, "regions").await;

    let operation = BulkMaintenanceOperation::new(env.stores.items.clone());
    let report = operation
        .run(&MaintenanceRequest::new("regions", MaintenanceAction::Delete).dry_run(true))
        .unwrap();
    assert_eq!(report.count_affected, 4);
    assert!(report.dry_run);
    assert_eq!(env.stores.items.list_for_job("regions").unwrap().len(), 4);

    let report = operation
        .run(&MaintenanceRequest::new("regions", MaintenanceAction::Delete))
        .unwrap();
    assert_eq!(report.count_affected, 4);
    assert!(env.stores.items.list_for_job("regions").unwrap().is_empty());
}

#[tokio::test]
async fn test_regeneration_after_delete_creates_fresh_items() {
    let env = environment();
    generate_all(&env, JobKind::Terms, "regions").await;
    let before: Vec<u64> = env
        .stores
        .items
        .list_for_job("regions")
        .unwrap()
        .iter()
        .map(|item| item.id)
        .collect();

    BulkMaintenanceOperation::new(env.stores.items.clone())
        .run(&MaintenanceRequest::new("regions", MaintenanceAction::Delete))
        .unwrap();
    generate_all(&env, JobKind::Terms, "regions").await;

    let after = env.stores.items.list_for_job("regions").unwrap();
    assert_eq!(after.len(), 4);
    assert!(after.iter().all(|item| !before.contains(&item.id)));
}

#[tokio::test]
async fn test_store_failure_reports_progress() {
    struct Broken;
    impl ItemStore for Broken {
        fn get(&self, _id: u64) -> Result<Option<GeneratedItem>, StorageError> {
            Ok(None)
        }
        fn upsert_at_index(
            &self,
            _job_id: &str,
            _kind: JobKind,
            _index: u64,
            _title: &str,
            _created_at_ms: u64,
        ) -> Result<ItemWrite, StorageError> {
            Err(StorageError::NotFound("read-only".to_string()))
        }
        fn list_for_job(&self, job_id: &str) -> Result<Vec<GeneratedItem>, StorageError> {
            Ok(vec![GeneratedItem {
                id: 1,
                job_id: job_id.to_string(),
                kind: JobKind::Terms,
                index: 0,
                title: "North".to_string(),
                created_at_ms: 1,
                status: ItemStatus::Published,
            }])
        }
        fn set_status(&self, _id: u64, _status: ItemStatus) -> Result<bool, StorageError> {
            Ok(false)
        }
        fn remove(&self, _id: u64) -> Result<bool, StorageError> {
            Err(StorageError::NotFound("disk gone".to_string()))
        }
    }

    let operation = BulkMaintenanceOperation::new(Arc::new(Broken));
    let err = operation
        .run(&MaintenanceRequest::new("regions", MaintenanceAction::Delete))
        .unwrap_err();
    assert!(matches!(err, RunError::MaintenanceFailed { affected: 0, .. }));
}
