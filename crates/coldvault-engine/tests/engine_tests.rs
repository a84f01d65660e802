//! End-to-end engine tests over the in-memory store, the mock provider,
//! and the capturing event sink.

use bytes::Bytes;
use coldvault_domain::{
    DocumentId, DocumentRecord, ProviderKind, RestoreSpeed, RestoreStatus, StorageTier,
};
use coldvault_engine::{
    ArchiveOrchestrator, EngineConfig, EngineError, EventKind, EventSink, MemoryEventSink,
    RestoreAction, RetryPolicy, SweepAction, UploadRequest,
};
use coldvault_provider::{MockProvider, ProviderError, ProviderRegistry, StorageProvider};
use coldvault_store::{MemoryMetadataStore, MetadataStore};
use std::collections::BTreeMap;
use std::sync::Arc;

struct Harness {
    engine: ArchiveOrchestrator,
    store: Arc<MemoryMetadataStore>,
    mock: Arc<MockProvider>,
    events: Arc<MemoryEventSink>,
}

fn harness(config: EngineConfig) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(MemoryMetadataStore::new());
    let mock = Arc::new(MockProvider::new());
    let events = Arc::new(MemoryEventSink::new());

    let mut providers = ProviderRegistry::new();
    providers.register(Arc::clone(&mock) as Arc<dyn StorageProvider>);

    let engine = ArchiveOrchestrator::new(
        config,
        Arc::clone(&store) as Arc<dyn MetadataStore>,
        Arc::new(providers),
        Arc::clone(&events) as Arc<dyn EventSink>,
    );
    Harness {
        engine,
        store,
        mock,
        events,
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Insert a back-dated record and the matching mock object
fn seed(h: &Harness, age_days: u64, tier: StorageTier) -> DocumentRecord {
    let id = DocumentId::new();
    let path = format!("archives/seed/{}/doc.txt", id);
    let mut record = DocumentRecord::new(
        id,
        path.clone(),
        ProviderKind::Local,
        "doc.txt".to_string(),
        "text/plain".to_string(),
        7,
        BTreeMap::new(),
        now_secs() - age_days * 86_400,
    );
    record.storage_tier = tier;
    if tier.is_cold() {
        record.restore_status = RestoreStatus::Archived;
    }
    h.store.insert(&record).unwrap();
    h.mock.insert_object(&path, &b"payload"[..], tier);
    record
}

#[tokio::test]
async fn test_upload_then_retrieve_roundtrip() {
    let h = harness(EngineConfig::default());

    let record = h
        .engine
        .upload_document(UploadRequest {
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: Bytes::from_static(b"pdf bytes"),
            tags: BTreeMap::from([("case".to_string(), "42".to_string())]),
            provider: None,
        })
        .await
        .unwrap();

    assert_eq!(record.storage_tier, StorageTier::Standard);
    assert_eq!(record.version, 1);
    assert!(record.storage_path.contains(&record.document_id.to_string()));
    assert_eq!(h.events.count(EventKind::Archived), 1);

    let data = h.engine.retrieve_document(record.document_id).await.unwrap();
    assert_eq!(data, Bytes::from_static(b"pdf bytes"));
}

#[tokio::test]
async fn test_retrieve_cold_document_is_not_retryable_advice() {
    let h = harness(EngineConfig::default());
    let record = seed(&h, 400, StorageTier::DeepArchive);

    let err = h.engine.retrieve_document(record.document_id).await.unwrap_err();
    match err {
        EngineError::Provider(ProviderError::NotRetrievable { .. }) => {}
        other => panic!("expected NotRetrievable, got {:?}", other),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_archive_now_is_idempotent() {
    let h = harness(EngineConfig::default());
    let record = seed(&h, 10, StorageTier::Standard);
    let id = record.document_id;

    let first = h.engine.archive_now(id, StorageTier::Archive).await.unwrap();
    assert!(first.changed);
    assert_eq!(first.previous_tier, StorageTier::Standard);
    assert_eq!(first.new_tier, StorageTier::Archive);

    let stored = h.store.get(id).unwrap().unwrap();
    assert_eq!(stored.storage_tier, StorageTier::Archive);
    assert_eq!(stored.restore_status, RestoreStatus::Archived);
    assert_eq!(stored.version, 2);

    // Repeat: success no-op, no version bump, no second event
    let second = h.engine.archive_now(id, StorageTier::Archive).await.unwrap();
    assert!(!second.changed);
    assert_eq!(h.store.get(id).unwrap().unwrap().version, 2);
    assert_eq!(h.events.count(EventKind::MovedToTier), 1);
}

#[tokio::test]
async fn test_archive_now_refuses_backward_moves() {
    let h = harness(EngineConfig::default());
    let record = seed(&h, 400, StorageTier::DeepArchive);

    let err = h
        .engine
        .archive_now(record.document_id, StorageTier::Standard)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Transition(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_eligibility_windows() {
    // Scenario: thresholds at 90 and 365 days
    let h = harness(EngineConfig::default());
    let young = seed(&h, 30, StorageTier::Standard);
    let middle_aged = seed(&h, 100, StorageTier::Standard);
    let old = seed(&h, 400, StorageTier::Standard);
    let old_archived = seed(&h, 400, StorageTier::Archive);
    let old_deep = seed(&h, 400, StorageTier::DeepArchive);

    let candidates = h.engine.list_eligible(now_secs()).unwrap();
    let target_of = |id: DocumentId| {
        candidates
            .iter()
            .find(|c| c.document_id == id)
            .map(|c| c.target_tier)
    };

    assert_eq!(target_of(young.document_id), None);
    assert_eq!(target_of(middle_aged.document_id), Some(StorageTier::Archive));
    assert_eq!(target_of(old.document_id), Some(StorageTier::DeepArchive));
    assert_eq!(
        target_of(old_archived.document_id),
        Some(StorageTier::DeepArchive)
    );
    // Already at the coldest tier
    assert_eq!(target_of(old_deep.document_id), None);
}

#[tokio::test]
async fn test_sweep_transitions_eligible_documents() {
    let h = harness(EngineConfig::default());
    let middle_aged = seed(&h, 100, StorageTier::Standard);
    let old = seed(&h, 400, StorageTier::Standard);
    seed(&h, 30, StorageTier::Standard);

    let report = h.engine.run_lifecycle_sweep(false).await.unwrap();
    assert!(!report.dry_run);
    assert_eq!(report.processed, 2);
    assert_eq!(report.transitioned, 2);
    assert_eq!(report.failed, 0);

    assert_eq!(
        h.store.get(middle_aged.document_id).unwrap().unwrap().storage_tier,
        StorageTier::Archive
    );
    assert_eq!(
        h.store.get(old.document_id).unwrap().unwrap().storage_tier,
        StorageTier::DeepArchive
    );
    assert_eq!(h.events.count(EventKind::MovedToTier), 2);

    // A second sweep finds nothing left to do
    let report = h.engine.run_lifecycle_sweep(false).await.unwrap();
    assert_eq!(report.transitioned, 0);
    assert_eq!(h.events.count(EventKind::MovedToTier), 2);
}

#[tokio::test]
async fn test_dry_run_is_pure() {
    let h = harness(EngineConfig::default());
    let record = seed(&h, 100, StorageTier::Standard);

    let report = h.engine.run_lifecycle_sweep(true).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.processed, 1);
    assert_eq!(report.transitioned, 0);
    assert_eq!(
        report.details[0].action,
        SweepAction::WouldTransition {
            from: StorageTier::Standard,
            to: StorageTier::Archive,
        }
    );

    // No provider calls, no metadata writes, no events
    assert_eq!(h.mock.call_count("archive_to_tier"), 0);
    let stored = h.store.get(record.document_id).unwrap().unwrap();
    assert_eq!(stored.storage_tier, StorageTier::Standard);
    assert_eq!(stored.version, 1);
    assert!(h.events.events().is_empty());
}

#[tokio::test]
async fn test_restore_flow_publishes_ready_exactly_once() {
    let h = harness(EngineConfig::default());
    let record = seed(&h, 400, StorageTier::DeepArchive);
    let id = record.document_id;

    let outcome = h.engine.restore_now(id, None, None).await.unwrap();
    assert_eq!(outcome.restore_status, RestoreStatus::InProgress);
    assert_eq!(outcome.restore_expiry, None);
    assert_eq!(outcome.estimated_completion, "3-5 hours");
    assert_eq!(h.events.count(EventKind::RestoreInitiated), 1);

    // A duplicate request while in progress is a no-op
    let duplicate = h
        .engine
        .restore_now(id, None, Some(RestoreSpeed::Expedited))
        .await
        .unwrap();
    assert_eq!(duplicate.restore_status, RestoreStatus::InProgress);
    assert_eq!(h.mock.call_count("request_restore"), 1);
    assert_eq!(h.events.count(EventKind::RestoreInitiated), 1);

    // Backend still working: the check leaves the record untouched
    let report = h.engine.run_restore_check().await.unwrap();
    assert_eq!(report.completed, 0);
    assert!(matches!(
        report.details[0].action,
        RestoreAction::StillInProgress
    ));

    // Backend reports the restored copy available (no expiry of its own)
    h.mock.set_restore_state(
        &record.storage_path,
        coldvault_provider::RestoreProbe::Ready { expires_at: None },
    );
    let before = now_secs();
    let report = h.engine.run_restore_check().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.events_published, 1);

    let stored = h.store.get(id).unwrap().unwrap();
    assert_eq!(stored.restore_status, RestoreStatus::Restored);
    // Tier never changes on restore
    assert_eq!(stored.storage_tier, StorageTier::DeepArchive);
    let expiry = stored.restore_expiry.unwrap();
    assert!(expiry >= before + 7 * 86_400);

    // Double check: completion publishes at most once
    let report = h.engine.run_restore_check().await.unwrap();
    assert_eq!(report.completed, 0);
    assert_eq!(h.events.count(EventKind::RestoreReady), 1);

    // And the restored copy downloads
    assert_eq!(
        h.engine.retrieve_document(id).await.unwrap(),
        Bytes::from_static(b"payload")
    );
}

#[tokio::test]
async fn test_renewal_extends_without_in_progress() {
    let h = harness(EngineConfig::default());
    let record = seed(&h, 400, StorageTier::DeepArchive);
    let id = record.document_id;

    // Put the record into Restored with a short window
    let mut restored = h.store.get(id).unwrap().unwrap();
    restored.restore_status = RestoreStatus::Restored;
    restored.restore_expiry = Some(now_secs() + 1_000);
    assert!(h.store.update_if_version(&restored, 1).unwrap());

    let outcome = h.engine.restore_now(id, Some(7), None).await.unwrap();
    assert_eq!(outcome.restore_status, RestoreStatus::Restored);
    assert!(outcome.restore_expiry.unwrap() >= now_secs() + 7 * 86_400 - 1);

    // Renewal never re-announces the restore
    assert_eq!(h.events.count(EventKind::RestoreInitiated), 0);
}

#[tokio::test]
async fn test_expiry_lapses_and_publishes_once() {
    let h = harness(EngineConfig::default());
    let record = seed(&h, 400, StorageTier::DeepArchive);
    let id = record.document_id;

    let mut restored = h.store.get(id).unwrap().unwrap();
    restored.restore_status = RestoreStatus::Restored;
    restored.restore_expiry = Some(now_secs() - 10);
    assert!(h.store.update_if_version(&restored, 1).unwrap());

    let report = h.engine.run_restore_check().await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(h.events.count(EventKind::RestoreExpired), 1);

    let stored = h.store.get(id).unwrap().unwrap();
    assert_eq!(stored.restore_status, RestoreStatus::Archived);
    assert_eq!(stored.restore_expiry, None);
    assert_eq!(stored.storage_tier, StorageTier::DeepArchive);

    // Lapsing is terminal; a second check changes nothing
    let report = h.engine.run_restore_check().await.unwrap();
    assert_eq!(report.expired, 0);
    assert_eq!(h.events.count(EventKind::RestoreExpired), 1);
}

#[tokio::test]
async fn test_partial_failure_continues_and_retries_next_sweep() {
    // Zero backoff so the failed document is eligible again immediately
    let config = EngineConfig {
        retry: RetryPolicy {
            max_attempts: 5,
            base_backoff_secs: 0,
            max_backoff_secs: 0,
        },
        max_in_flight: 1,
        ..Default::default()
    };
    let h = harness(config);
    seed(&h, 100, StorageTier::Standard);
    seed(&h, 100, StorageTier::Standard);

    h.mock.fail_once(
        "archive_to_tier",
        ProviderError::Unavailable("backend flapping".to_string()),
    );

    let report = h.engine.run_lifecycle_sweep(false).await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.transitioned, 1);
    assert_eq!(report.failed, 1);
    let failed = report
        .details
        .iter()
        .find(|d| matches!(d.action, SweepAction::Failed { .. }))
        .unwrap();
    assert!(matches!(
        failed.action,
        SweepAction::Failed { retryable: true, .. }
    ));

    // The next sweep picks the failed document up and succeeds
    let report = h.engine.run_lifecycle_sweep(false).await.unwrap();
    assert_eq!(report.transitioned, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(h.events.count(EventKind::MovedToTier), 2);
}

#[tokio::test]
async fn test_backoff_window_skips_document() {
    let config = EngineConfig {
        retry: RetryPolicy {
            max_attempts: 5,
            base_backoff_secs: 3_600,
            max_backoff_secs: 3_600,
        },
        ..Default::default()
    };
    let h = harness(config);
    let record = seed(&h, 100, StorageTier::Standard);

    h.mock.fail_once(
        "archive_to_tier",
        ProviderError::Timeout { op: "archive_to_tier" },
    );

    let report = h.engine.run_lifecycle_sweep(false).await.unwrap();
    assert_eq!(report.failed, 1);

    // Inside the backoff window: skipped, not re-attempted
    let report = h.engine.run_lifecycle_sweep(false).await.unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.transitioned, 0);
    assert!(matches!(
        report.details[0].action,
        SweepAction::SkippedBackoff { .. }
    ));
    assert_eq!(
        h.store.get(record.document_id).unwrap().unwrap().storage_tier,
        StorageTier::Standard
    );
    // One real attempt happened in total
    assert_eq!(h.mock.call_count("archive_to_tier"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_archive_requests_have_one_winner() {
    let h = harness(EngineConfig::default());
    let record = seed(&h, 10, StorageTier::Standard);
    let id = record.document_id;
    let engine = Arc::new(h.engine);

    let a = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.archive_now(id, StorageTier::Archive).await })
    };
    let b = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.archive_now(id, StorageTier::Archive).await })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];

    // Whatever the interleaving: at least one success, losers fail only
    // with a retryable version conflict, and the event fires exactly once
    let mut changed = 0;
    for result in &results {
        match result {
            Ok(outcome) => {
                if outcome.changed {
                    changed += 1;
                }
            }
            Err(e) => assert!(matches!(e, EngineError::VersionConflict { .. })),
        }
    }
    assert_eq!(changed, 1);

    let stored = h.store.get(id).unwrap().unwrap();
    assert_eq!(stored.storage_tier, StorageTier::Archive);
    assert_eq!(stored.version, 2);
    assert_eq!(h.events.count(EventKind::MovedToTier), 1);
}

#[tokio::test]
async fn test_get_status_probes_and_degrades() {
    let h = harness(EngineConfig::default());
    let record = seed(&h, 400, StorageTier::DeepArchive);
    let id = record.document_id;

    let status = h.engine.get_status(id).await.unwrap();
    assert_eq!(status.storage_tier, StorageTier::DeepArchive);
    assert_eq!(status.restore_status, RestoreStatus::Archived);
    assert!(!status.is_retrievable);

    // Probe failure degrades to record-derived retrievability instead of
    // erroring
    h.mock.fail_once(
        "archive_status",
        ProviderError::Unavailable("probe flake".to_string()),
    );
    let status = h.engine.get_status(id).await.unwrap();
    assert!(!status.is_retrievable);

    // The status path never writes reconciliation
    assert_eq!(h.store.get(id).unwrap().unwrap().version, 1);
}

#[tokio::test]
async fn test_status_for_missing_document() {
    let h = harness(EngineConfig::default());
    let err = h.engine.get_status(DocumentId::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_worker_cycle_sweeps_and_checks() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let store = Arc::new(MemoryMetadataStore::new());
    let mock = Arc::new(MockProvider::new());
    let events = Arc::new(MemoryEventSink::new());
    let mut providers = ProviderRegistry::new();
    providers.register(Arc::clone(&mock) as Arc<dyn StorageProvider>);

    let id = DocumentId::new();
    let path = format!("archives/seed/{}/doc.txt", id);
    let mut record = DocumentRecord::new(
        id,
        path.clone(),
        ProviderKind::Local,
        "doc.txt".to_string(),
        "text/plain".to_string(),
        7,
        BTreeMap::new(),
        now_secs() - 100 * 86_400,
    );
    record.storage_tier = StorageTier::Standard;
    store.insert(&record).unwrap();
    mock.insert_object(&path, &b"payload"[..], StorageTier::Standard);

    let worker = coldvault_engine::LifecycleWorker::new(
        EngineConfig::default(),
        Arc::clone(&store) as Arc<dyn MetadataStore>,
        Arc::new(providers),
        Arc::clone(&events) as Arc<dyn EventSink>,
    );
    worker.run_cycles(1).await.unwrap();

    assert_eq!(
        store.get(id).unwrap().unwrap().storage_tier,
        StorageTier::Archive
    );
    assert_eq!(events.count(EventKind::MovedToTier), 1);
}

#[tokio::test]
async fn test_worker_run_stops_on_cancel() {
    let store = Arc::new(MemoryMetadataStore::new());
    let providers = ProviderRegistry::new();
    let worker = coldvault_engine::LifecycleWorker::new(
        EngineConfig::default(),
        store as Arc<dyn MetadataStore>,
        Arc::new(providers),
        Arc::new(MemoryEventSink::new()) as Arc<dyn EventSink>,
    );
    let cancel = worker.cancel_token();

    let run = tokio::spawn(async move { worker.run().await });
    cancel.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_upload_to_unconfigured_provider() {
    let h = harness(EngineConfig::default());
    let err = h
        .engine
        .upload_document(UploadRequest {
            filename: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: Bytes::from_static(b"x"),
            tags: BTreeMap::new(),
            provider: Some(ProviderKind::Aws),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownProvider(ProviderKind::Aws)));
}
