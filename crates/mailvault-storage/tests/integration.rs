//! Integration tests for the file-storage client.
//!
//! These run every operation against a local mock server, covering the
//! retry, rewind, cancellation, and semantic-error behavior end to end
//! without a real storage account.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mailvault_storage::retry::{self, Verdict};
use mailvault_storage::{Config, Error, RetryPolicy, StorageClient};

/// Retry policy with delays short enough for tests.
fn fast_policy() -> RetryPolicy {
    RetryPolicy::default()
        .max_attempts(3)
        .base_delay(Duration::from_millis(10))
        .max_delay(Duration::from_millis(40))
        .jitter(0.0)
}

fn client(server: &MockServer) -> StorageClient {
    let config =
        Config::new(Url::parse(&server.uri()).unwrap(), "test-token").retry(fast_policy());
    StorageClient::new(config).unwrap()
}

const LISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<multistatus xmlns="DAV:">
  <response>
    <href>/docs/</href>
    <propstat>
      <prop><displayname>docs</displayname><resourcetype><collection/></resourcetype></prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
  <response>
    <href>/docs/a.txt</href>
    <propstat>
      <prop>
        <displayname>a.txt</displayname>
        <getcontentlength>5</getcontentlength>
        <getcontenttype>text/plain</getcontenttype>
        <getlastmodified>Tue, 05 Mar 2024 10:15:00 GMT</getlastmodified>
        <resourcetype/>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
  <response>
    <href>/docs/sub/</href>
    <propstat>
      <prop><displayname>sub</displayname><resourcetype><collection/></resourcetype></prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
</multistatus>"#;

// ---------------------------------------------------------------------------
// Retry executor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn executor_invokes_factory_once_per_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let cancel = CancellationToken::new();
    let policy = fast_policy().max_attempts(5);
    let calls = AtomicU32::new(0);
    let url = format!("{}/ping", server.uri());

    // Classifier stops on the third call: exactly three factory invocations.
    let response = retry::execute(
        &http,
        &cancel,
        &policy,
        "test",
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            let request = http.get(&url).build();
            async move { request.map_err(Error::from) }
        },
        |attempt, _| {
            if attempt >= 2 {
                Verdict::Done
            } else {
                Verdict::Retry
            }
        },
    )
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(response.status().as_u16(), 503);
}

#[tokio::test]
async fn executor_returns_last_response_after_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let cancel = CancellationToken::new();
    let policy = fast_policy();
    let calls = AtomicU32::new(0);
    let url = format!("{}/ping", server.uri());

    let response = retry::execute(
        &http,
        &cancel,
        &policy,
        "test",
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            let request = http.get(&url).build();
            async move { request.map_err(Error::from) }
        },
        |_, _| Verdict::Retry,
    )
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3, "attempts are bounded");
    assert_eq!(response.status().as_u16(), 503);
}

#[tokio::test]
async fn cancellation_during_backoff_returns_promptly() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let policy = RetryPolicy::default()
        .max_attempts(5)
        .base_delay(Duration::from_secs(30))
        .jitter(0.0);
    let config = Config::new(Url::parse(&server.uri()).unwrap(), "test-token").retry(policy);
    let storage = StorageClient::new(config).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let result = storage.delete("/victim.txt", &cancel).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "cancel must interrupt the 30s backoff sleep, took {:?}",
        start.elapsed()
    );
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_returns_children_without_self_entry() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path("/docs/"))
        .and(header("Depth", "1"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(207).set_body_string(LISTING))
        .mount(&server)
        .await;

    let entries = client(&server)
        .list("/docs", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(entries.len(), 2, "self entry must be excluded");
    let file = entries.iter().find(|e| e.name == "a.txt").unwrap();
    assert!(!file.is_dir);
    assert_eq!(file.size, 5);
    let dir = entries.iter().find(|e| e.name == "sub").unwrap();
    assert!(dir.is_dir);
}

#[tokio::test]
async fn list_missing_collection_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client(&server).list("/gone", &CancellationToken::new()).await;
    assert!(matches!(result, Err(Error::NotFound(p)) if p == "/gone"));
}

#[tokio::test]
async fn list_garbage_body_is_a_hard_error() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(207).set_body_string("<multistatus><resp"))
        .mount(&server)
        .await;

    let result = client(&server).list("/docs", &CancellationToken::new()).await;
    assert!(matches!(result, Err(Error::Xml(_))));
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_retries_with_identical_body() {
    let server = MockServer::start().await;
    // First attempt is throttled, second succeeds.
    Mock::given(method("PUT"))
        .and(path("/dest.bin"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/dest.bin"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.bin");
    let payload = b"rewind-me-please".to_vec();
    std::fs::write(&source, &payload).unwrap();

    client(&server)
        .upload(&source, "/dest.bin", &CancellationToken::new())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let puts: Vec<_> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .collect();
    assert_eq!(puts.len(), 2, "one throttled attempt plus one success");
    assert_eq!(puts[0].body, payload);
    assert_eq!(
        puts[1].body, payload,
        "retried body must be byte-identical to the source"
    );
}

#[tokio::test]
async fn upload_missing_source_fails_without_network() {
    let server = MockServer::start().await;
    let result = client(&server)
        .upload(
            std::path::Path::new("/nonexistent/source.bin"),
            "/dest.bin",
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(Error::Io(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upload_terminal_failure_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(507).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.bin");
    std::fs::write(&source, b"data").unwrap();

    let result = client(&server)
        .upload(&source, "/dest.bin", &CancellationToken::new())
        .await;

    match result {
        Err(Error::Protocol {
            operation,
            status,
            body,
        }) => {
            assert_eq!(operation, "upload");
            assert_eq!(status.as_u16(), 507);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_writes_destination_atomically() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pdf-bytes".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("report.pdf");

    client(&server)
        .download("/report.pdf", &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"pdf-bytes");
    assert!(
        !dir.path().join("report.pdf.part").exists(),
        "temporary sink must be gone after the rename"
    );
}

#[tokio::test]
async fn download_missing_file_maps_to_not_found_and_leaves_no_sink() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("report.pdf");

    let result = client(&server)
        .download("/report.pdf", &dest, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(!dest.exists());
    assert!(!dir.path().join("report.pdf.part").exists());
}

#[tokio::test]
async fn download_recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"second-try".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("file.bin");

    client(&server)
        .download("/file.bin", &dest, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"second-try");
}

// ---------------------------------------------------------------------------
// Mkdir / Delete / Move
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mkdir_existing_collection_maps_to_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("MKCOL"))
        .and(path("/docs/"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;

    let result = client(&server).mkdir("/docs", &CancellationToken::new()).await;
    assert!(matches!(result, Err(Error::AlreadyExists(p)) if p == "/docs"));
}

#[tokio::test]
async fn mkdir_success_uses_trailing_slash_path() {
    let server = MockServer::start().await;
    Mock::given(method("MKCOL"))
        .and(path("/newdir/"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    client(&server)
        .mkdir("/newdir", &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_missing_resource_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client(&server)
        .delete("/gone.txt", &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::NotFound(p)) if p == "/gone.txt"));
}

#[tokio::test]
async fn move_missing_source_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("MOVE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client(&server)
        .rename("/a.txt", "/b.txt", &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::NotFound(p)) if p == "/a.txt"));
}

#[tokio::test]
async fn move_occupied_destination_maps_to_destination_exists() {
    let server = MockServer::start().await;
    Mock::given(method("MOVE"))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;

    let result = client(&server)
        .rename("/a.txt", "/b.txt", &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::DestinationExists(p)) if p == "/b.txt"));
}

#[tokio::test]
async fn move_sets_destination_and_disallows_overwrite() {
    let server = MockServer::start().await;
    Mock::given(method("MOVE"))
        .and(path("/a.txt"))
        .and(header("Overwrite", "F"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    client(&server)
        .rename("/a.txt", "/b.txt", &CancellationToken::new())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let destination = requests[0].headers.get("Destination").unwrap();
    assert!(
        destination.to_str().unwrap().ends_with("/b.txt"),
        "destination header must carry the target URL"
    );
}

// ---------------------------------------------------------------------------
// Validation happens before any network attempt
// ---------------------------------------------------------------------------

#[tokio::test]
async fn traversal_paths_never_reach_the_wire() {
    let server = MockServer::start().await;
    let storage = client(&server);
    let cancel = CancellationToken::new();

    assert!(matches!(
        storage.list("/../etc", &cancel).await,
        Err(Error::InvalidPath(_))
    ));
    assert!(matches!(
        storage.delete("/a/../b", &cancel).await,
        Err(Error::InvalidPath(_))
    ));
    assert!(matches!(
        storage.rename("/ok.txt", "/../no", &cancel).await,
        Err(Error::InvalidPath(_))
    ));

    assert!(server.received_requests().await.unwrap().is_empty());
}
