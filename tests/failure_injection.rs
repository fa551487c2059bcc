//! Failure injection: unreachable or flaky stores behind a running server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use config_push_server::http::HttpServer;
use config_push_server::store::{
    ConfigRecordStore, HistoryArchive, HistorySnapshot, MemoryStore, StoreError, StoreResult,
    StoredRecord,
};
use config_sdk::{ConfigClient, ConfigEntry};
use reqwest::StatusCode;

mod common;

/// Record store that fails every call while `down` is set.
struct Flaky {
    inner: MemoryStore,
    down: AtomicBool,
}

impl Flaky {
    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl ConfigRecordStore for Flaky {
    fn find_by_label(&self, label: &str) -> StoreResult<Option<StoredRecord>> {
        self.check()?;
        ConfigRecordStore::find_by_label(&self.inner, label)
    }
    fn labels(&self) -> StoreResult<Vec<String>> {
        self.check()?;
        self.inner.labels()
    }
    fn insert(&self, record: StoredRecord) -> StoreResult<StoredRecord> {
        self.check()?;
        self.inner.insert(record)
    }
    fn compare_and_swap(&self, record: StoredRecord, expected_version: u64) -> StoreResult<StoredRecord> {
        self.check()?;
        self.inner.compare_and_swap(record, expected_version)
    }
}

/// History archive whose appends always fail.
struct BrokenArchive;

impl HistoryArchive for BrokenArchive {
    fn append(&self, _snapshot: HistorySnapshot) -> StoreResult<()> {
        Err(StoreError::Unavailable("disk full".into()))
    }
    fn find_by_label(&self, _label: &str) -> StoreResult<Vec<HistorySnapshot>> {
        Ok(Vec::new())
    }
    fn find_by_label_and_version(&self, _label: &str, _version: u64) -> StoreResult<Option<HistorySnapshot>> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_store_outage_maps_to_503_and_recovers() {
    let store = MemoryStore::new(None);
    let flaky = Arc::new(Flaky {
        inner: store.clone(),
        down: AtomicBool::new(false),
    });
    let server = HttpServer::with_stores(common::test_config(), flaky.clone(), Arc::new(store));
    let server = common::spawn(server).await;
    let client = ConfigClient::new(&server.url());

    // Subscribe before the create so its push cannot arrive late and be
    // mistaken for one produced during the outage.
    let mut stream = client.watch("APP1").await.unwrap();
    client.create("APP1", &[]).await.unwrap();
    let created = tokio::time::timeout(Duration::from_secs(3), stream.next())
        .await
        .expect("create push not delivered")
        .unwrap()
        .unwrap();
    assert_eq!(created.version, 1);

    flaky.down.store(true, Ordering::SeqCst);
    for err in [
        client.get("APP1").await.unwrap_err(),
        client.labels().await.unwrap_err(),
        client.create("APP2", &[]).await.unwrap_err(),
        client.patch("APP1", &[ConfigEntry::new("K", "v", "")]).await.unwrap_err(),
    ] {
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(err.message(), Some("Storage Unavailable"));
    }
    let health = client.health().await.unwrap();
    assert_eq!(health["status"], "degraded");

    // Nothing was committed, so nothing was pushed.
    assert!(tokio::time::timeout(Duration::from_millis(300), stream.next())
        .await
        .is_err());

    flaky.down.store(false, Ordering::SeqCst);
    let patched = client.patch("APP1", &[ConfigEntry::new("K", "v", "")]).await.unwrap();
    assert_eq!(patched.version, 2);

    server.stop().await;
}

#[tokio::test]
async fn test_history_failure_does_not_fail_mutation() {
    let store = MemoryStore::new(None);
    let server = HttpServer::with_stores(common::test_config(), Arc::new(store), Arc::new(BrokenArchive));
    let server = common::spawn(server).await;
    let client = ConfigClient::new(&server.url());

    client.create("APP1", &[ConfigEntry::new("K1", "v1", "")]).await.unwrap();
    let updated = client.update("APP1", &[ConfigEntry::new("K2", "v2", "")]).await.unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(client.get("APP1").await.unwrap().unwrap().version, 2);

    server.stop().await;
}
