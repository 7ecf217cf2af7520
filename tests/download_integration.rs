//! End-to-end downloads against a mock Gallica over real HTTP.

mod support;

use std::path::Path;
use std::sync::{Arc, Mutex};

use gallica_core::download::{
    BlockFetcher, DownloadEvent, DownloadObserver, DownloadOrchestrator, DownloadRequest,
    DownloadState, HttpClient, OrchestratorError, PlanningError, RetryPolicy,
};
use gallica_core::gallica::{GallicaClient, GallicaRoutes};
use gallica_core::parser::Ark;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use wiremock::MockServer;

use support::gallica::{
    ARK, BlockResponder, block_requests, mount_blocks, mount_pagination, page_texts,
};
use support::socket_guard::start_mock_server_or_skip;

#[derive(Default)]
struct Recorder(Mutex<Vec<DownloadEvent>>);

impl DownloadObserver for Recorder {
    fn on_event(&self, event: &DownloadEvent) {
        self.0.lock().expect("recorder lock").push(event.clone());
    }
}

fn orchestrator(server: &MockServer, attempts: u32) -> DownloadOrchestrator {
    let transport = Arc::new(HttpClient::new().expect("http client"));
    let routes = GallicaRoutes::new(&server.uri()).expect("mock routes");
    let metadata = Arc::new(GallicaClient::new(transport.clone(), routes.clone()));
    let fetcher =
        BlockFetcher::new(transport, routes).with_policy(RetryPolicy::immediate(attempts));
    DownloadOrchestrator::new(metadata, fetcher)
}

fn ark() -> Ark {
    Ark::parse(ARK).expect("valid ark")
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_whole_document_in_blocks() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_pagination(&server, 250).await;
    mount_blocks(&server, BlockResponder::healthy()).await;

    let dir = TempDir::new().expect("temp dir");
    let output = dir.path().join("book.pdf");
    let request = DownloadRequest::new(ark(), &output).with_block_size(Some(100));

    let report = assert_ok!(orchestrator(&server, 3).run(&request).await);

    assert_eq!((report.first_view, report.last_view), (1, 250));
    assert_eq!(report.blocks, 3);
    assert_eq!(report.pages, 250 + 2);
    assert_eq!(
        block_requests(&server).await,
        [(1, 100), (101, 100), (201, 50)]
    );

    let bytes = std::fs::read(&output).expect("output written");
    assert_eq!(report.bytes, bytes.len());
    let texts = page_texts(&bytes);
    assert_eq!(texts.len(), 252);
    assert!(texts[0].contains("f1 page 0"));
    assert!(texts[102].contains("f101 page 2"));
    assert!(texts[251].contains("f201 page 51"));
    assert_eq!(entries(dir.path()), ["book.pdf"]);
}

#[tokio::test]
async fn test_explicit_range_skips_pagination() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    // No Pagination mock: a lookup would 404 and fail planning.
    mount_blocks(&server, BlockResponder::healthy()).await;

    let dir = TempDir::new().expect("temp dir");
    let request = DownloadRequest::new(ark(), dir.path().join("part.pdf"))
        .with_range(11, Some(22))
        .with_block_size(Some(10));

    let report = assert_ok!(orchestrator(&server, 1).run(&request).await);
    assert_eq!(report.pages, 12 + 2);
    assert_eq!(block_requests(&server).await, [(11, 10), (21, 2)]);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_pagination(&server, 30).await;
    mount_blocks(&server, BlockResponder::flaky(2, 503)).await;

    let dir = TempDir::new().expect("temp dir");
    let recorder = Arc::new(Recorder::default());
    let request = DownloadRequest::new(ark(), dir.path().join("book.pdf"))
        .with_block_size(Some(10))
        .with_max_trials(3);

    let report = assert_ok!(
        orchestrator(&server, 3)
            .with_observer(recorder.clone())
            .run(&request)
            .await
    );
    assert_eq!(report.attempts, 3 + 2);

    let events = recorder.0.lock().expect("recorder lock");
    let failed = events
        .iter()
        .filter(|event| matches!(event, DownloadEvent::AttemptFailed { .. }))
        .count();
    assert_eq!(failed, 2);
    assert_eq!(
        events.last(),
        Some(&DownloadEvent::StateChanged(DownloadState::Done))
    );
}

#[tokio::test]
async fn test_exhausted_block_leaves_no_output() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_pagination(&server, 30).await;
    mount_blocks(&server, BlockResponder::broken_block(21, 500)).await;

    let dir = TempDir::new().expect("temp dir");
    let output = dir.path().join("book.pdf");
    let request = DownloadRequest::new(ark(), &output)
        .with_block_size(Some(10))
        .with_max_trials(4);

    let err = assert_err!(orchestrator(&server, 4).run(&request).await);
    match err {
        OrchestratorError::BlockFailed {
            index,
            block,
            attempts,
            ..
        } => {
            assert_eq!(index, 2);
            assert_eq!(block.start(), 21);
            assert_eq!(attempts, 4);
        }
        other => panic!("expected BlockFailed, got {other:?}"),
    }
    let retried = block_requests(&server)
        .await
        .into_iter()
        .filter(|(start, _)| *start == 21)
        .count();
    assert_eq!(retried, 4);
    assert!(!output.exists());
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_missing_document_fails_planning() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().expect("temp dir");
    let request = DownloadRequest::new(ark(), dir.path().join("book.pdf"));

    let err = assert_err!(orchestrator(&server, 1).run(&request).await);
    assert!(matches!(
        err,
        OrchestratorError::Planning(PlanningError::PageCount { .. })
    ));
    assert_eq!(err.failed_in(), DownloadState::Planning);
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_parallel_fetch_keeps_view_order() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_pagination(&server, 45).await;
    mount_blocks(&server, BlockResponder::healthy()).await;

    let dir = TempDir::new().expect("temp dir");
    let output = dir.path().join("book.pdf");
    let request = DownloadRequest::new(ark(), &output).with_block_size(Some(10));

    let report = assert_ok!(
        orchestrator(&server, 1)
            .with_concurrency(4)
            .expect("valid concurrency")
            .run(&request)
            .await
    );
    assert_eq!(report.pages, 47);

    let texts = page_texts(&std::fs::read(&output).expect("output written"));
    for (index, start) in [1_u32, 11, 21, 31, 41].iter().enumerate() {
        let first_kept = if index == 0 { 0 } else { 12 + (index - 1) * 10 };
        let page = if index == 0 { 0 } else { 2 };
        assert!(
            texts[first_kept].contains(&format!("f{start} page {page}")),
            "block {index} out of place"
        );
    }
}
