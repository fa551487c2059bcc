//! End-to-end tests of the config HTTP API through the SDK.

use std::time::Duration;

use chrono::Utc;
use config_push_server::dispatch::WebhookHandler;
use config_push_server::http::HttpServer;
use config_sdk::{ClientFeedback, ConfigClient, ConfigEntry};
use reqwest::StatusCode;

mod common;

fn entry(key: &str, value: &str, description: &str) -> ConfigEntry {
    ConfigEntry::new(key, value, description)
}

#[tokio::test]
async fn test_create_patch_update_lifecycle() {
    let server = common::spawn(HttpServer::new(common::test_config()).unwrap()).await;
    let client = ConfigClient::new(&server.url());

    let created = client.create("APP1", &[entry("K1", "v1", "d1")]).await.unwrap();
    assert_eq!(created.version, 1);

    let patched = client.patch("APP1", &[entry("K2", "v2", "d2")]).await.unwrap();
    assert_eq!(patched.version, 2);
    assert_eq!(patched.config_data, vec![entry("K1", "v1", "d1"), entry("K2", "v2", "d2")]);

    let updated = client.update("APP1", &[entry("K3", "v3", "d3")]).await.unwrap();
    assert_eq!(updated.version, 3);
    assert_eq!(updated.config_data, vec![entry("K3", "v3", "d3")]);

    assert_eq!(client.get("APP1").await.unwrap(), Some(updated));

    let history = client.history("APP1").await.unwrap();
    assert_eq!(history.iter().map(|s| s.version).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(history[0].decoded_entries().unwrap(), vec![entry("K1", "v1", "d1")]);

    server.stop().await;
}

#[tokio::test]
async fn test_error_statuses() {
    let server = common::spawn(HttpServer::new(common::test_config()).unwrap()).await;
    let client = ConfigClient::new(&server.url());

    assert_eq!(client.get("NOPE").await.unwrap(), None);

    let err = client.patch("NOPE", &[entry("K", "", "")]).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.message(), Some("Label Not Found"));

    let err = client
        .create("APP1", &[entry("K1", "a", ""), entry("K1", "b", "")])
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(err.message(), Some("Duplicate Keys: K1"));
    assert_eq!(client.get("APP1").await.unwrap(), None);

    client.create("APP1", &[]).await.unwrap();
    let err = client.create("APP1", &[]).await.unwrap_err();
    assert_eq!(err.message(), Some("Label Already Exists"));

    let err = client.history_version("APP1", 1).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.message(), Some("Version Not Found"));

    let err = client.history("GHOST").await.unwrap_err();
    assert_eq!(err.message(), Some("Label Not Found"));

    server.stop().await;
}

#[tokio::test]
async fn test_labels_listing() {
    let server = common::spawn(HttpServer::new(common::test_config()).unwrap()).await;
    let client = ConfigClient::new(&server.url());

    assert!(client.labels().await.unwrap().is_empty());
    for label in ["zeta", "Alpha", "MID"] {
        client.create(label, &[]).await.unwrap();
    }
    assert_eq!(client.labels().await.unwrap(), vec!["ALPHA", "MID", "ZETA"]);

    let health = client.health().await.unwrap();
    assert_eq!(health["labels"], 3);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_have_one_winner() {
    let server = common::spawn(HttpServer::new(common::test_config()).unwrap()).await;
    let url = server.url();

    let mut tasks = Vec::new();
    for i in 0..10 {
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            ConfigClient::new(&url)
                .create("RACE", &[entry("K", &i.to_string(), "")])
                .await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(record) => {
                winners += 1;
                assert_eq!(record.version, 1);
            }
            Err(e) => assert_eq!(e.message(), Some("Label Already Exists")),
        }
    }
    assert_eq!(winners, 1);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_patches_to_distinct_keys_all_land() {
    let mut config = common::test_config();
    config.retries.max_attempts = 100;
    config.retries.base_delay_ms = 1;
    config.retries.max_delay_ms = 10;
    let server = common::spawn(HttpServer::new(config).unwrap()).await;
    let url = server.url();
    ConfigClient::new(&url).create("APP1", &[]).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..6 {
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            ConfigClient::new(&url)
                .patch("APP1", &[entry(&format!("K{i}"), "v", "")])
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let record = ConfigClient::new(&url).get("APP1").await.unwrap().unwrap();
    assert_eq!(record.version, 7);
    assert_eq!(record.config_data.len(), 6);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_webhooks_receive_events_and_feedback() {
    let (event_url, mut events) = common::start_webhook_sink().await;
    let (feedback_url, mut feedback) = common::start_webhook_sink().await;

    let server = HttpServer::new(common::test_config()).unwrap();
    server
        .state()
        .events()
        .register(WebhookHandler::new(&event_url, Duration::from_secs(2)).unwrap());
    server
        .state()
        .feedback
        .register(WebhookHandler::new(&feedback_url, Duration::from_secs(2)).unwrap());
    let server = common::spawn(server).await;
    let client = ConfigClient::new(&server.url());

    client.create("APP1", &[entry("K1", "v1", "")]).await.unwrap();
    let event = common::recv(&mut events).await;
    assert_eq!(event["label"], "APP1");
    assert_eq!(event["eventType"], "CREATE");

    let report = ClientFeedback {
        label: "APP1".into(),
        client_id: "host-1".into(),
        client_version: 1,
        last_update_time: Utc::now(),
    };
    client.feedback(&report).await.unwrap();
    let received = common::recv(&mut feedback).await;
    assert_eq!(received["clientId"], "host-1");
    assert_eq!(received["clientVersion"], 1);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_feedback_succeeds_when_handler_unreachable() {
    let server = HttpServer::new(common::test_config()).unwrap();
    server
        .state()
        .feedback
        .register(WebhookHandler::new("http://127.0.0.1:1/hook", Duration::from_millis(200)).unwrap());
    let server = common::spawn(server).await;

    let report = ClientFeedback {
        label: "APP1".into(),
        client_id: "host-1".into(),
        client_version: 4,
        last_update_time: Utc::now(),
    };
    ConfigClient::new(&server.url()).feedback(&report).await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config();
    config.storage.persistence_path = Some(dir.path().join("store.json").to_string_lossy().into_owned());

    let server = common::spawn(HttpServer::new(config.clone()).unwrap()).await;
    let client = ConfigClient::new(&server.url());
    client.create("APP1", &[entry("K1", "v1", "")]).await.unwrap();
    client.patch("APP1", &[entry("K2", "v2", "")]).await.unwrap();
    server.stop().await;

    let server = common::spawn(HttpServer::new(config).unwrap()).await;
    let client = ConfigClient::new(&server.url());
    let record = client.get("APP1").await.unwrap().unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.config_data.len(), 2);
    assert_eq!(client.history("APP1").await.unwrap().len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_zero_flush_interval_saves_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config();
    config.storage.persistence_path = Some(dir.path().join("store.json").to_string_lossy().into_owned());
    config.storage.flush_interval_secs = 0;

    let server = common::spawn(HttpServer::new(config.clone()).unwrap()).await;
    ConfigClient::new(&server.url()).create("APP1", &[]).await.unwrap();
    server.stop().await;

    let server = common::spawn(HttpServer::new(config).unwrap()).await;
    let record = ConfigClient::new(&server.url()).get("APP1").await.unwrap();
    assert_eq!(record.map(|r| r.version), Some(1));
    server.stop().await;
}

#[tokio::test]
async fn test_labels_with_reserved_characters() {
    let server = common::spawn(HttpServer::new(common::test_config()).unwrap()).await;
    let client = ConfigClient::new(&server.url());

    for label in ["APP#1", "B?x=1", "C/D", "E F"] {
        let created = client.create(label, &[entry("K", "v", "")]).await.unwrap();
        assert_eq!(created.label, label);
        let patched = client.patch(label, &[entry("K2", "v", "")]).await.unwrap();
        assert_eq!(patched.version, 2);
        assert_eq!(client.history(label).await.unwrap().len(), 1);
        assert_eq!(client.history_version(label, 1).await.unwrap().label, label);
    }
    assert!(client.get("APP").await.unwrap().is_none());
    assert!(client.get("B").await.unwrap().is_none());
    assert_eq!(client.labels().await.unwrap(), vec!["APP#1", "B?X=1", "C/D", "E F"]);

    server.stop().await;
}
