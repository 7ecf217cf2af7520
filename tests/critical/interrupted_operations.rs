//! Runs that stop midway: the previous output survives and no staging
//! directory is left behind.

use std::sync::Arc;
use std::time::Duration;

use gallica_core::download::{
    BlockFetcher, DownloadOrchestrator, DownloadRequest, HttpClient, OrchestratorError,
    RetryPolicy,
};
use gallica_core::gallica::{GallicaClient, GallicaRoutes};
use gallica_core::Ark;
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::gallica::{
    ARK, BlockResponder, NAME, block_requests, mount_blocks, mount_pagination, sample_pdf,
};
use crate::support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

fn orchestrator(server: &MockServer, concurrency: usize) -> DownloadOrchestrator {
    let transport = Arc::new(HttpClient::new().expect("http client"));
    let routes = GallicaRoutes::new(&server.uri()).expect("routes");
    let metadata = Arc::new(GallicaClient::new(transport.clone(), routes.clone()));
    DownloadOrchestrator::new(
        metadata,
        BlockFetcher::new(transport, routes).with_policy(RetryPolicy::immediate(1)),
    )
    .with_concurrency(concurrency)
    .expect("valid concurrency")
}

#[tokio::test]
async fn p1_failed_run_keeps_previous_output() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    mount_pagination(&server, 20).await;
    mount_blocks(&server, BlockResponder::broken_block(11, 503)).await;

    let dir = TempDir::new().expect("temp dir");
    let output = dir.path().join("book.pdf");
    std::fs::write(&output, b"%PDF-previous").expect("seed output");

    let request = DownloadRequest::new(Ark::parse(ARK).expect("ark"), &output)
        .with_block_size(Some(10))
        .with_max_trials(1);
    orchestrator(&server, 1)
        .run(&request)
        .await
        .expect_err("second block is broken");

    assert_eq!(std::fs::read(&output).expect("output kept"), b"%PDF-previous");
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(names, ["book.pdf"]);
}

#[tokio::test]
async fn p1_first_failure_cancels_pending_blocks() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    mount_pagination(&server, 100).await;
    // Block 1 fails immediately; every other block is slow.
    Mock::given(method("GET"))
        .and(path_regex(format!(r"^/ark:/12148/{NAME}/f1n10\.pdf$")))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"\.pdf$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(sample_pdf("slow", 12))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let output = dir.path().join("book.pdf");
    let request = DownloadRequest::new(Ark::parse(ARK).expect("ark"), &output)
        .with_block_size(Some(10))
        .with_max_trials(1);

    let err = orchestrator(&server, 2)
        .run(&request)
        .await
        .expect_err("first block fails");
    assert!(matches!(err, OrchestratorError::BlockFailed { index: 0, .. }), "{err:?}");

    // With two slots, at most block 2 was in flight; the other eight never started.
    let requested = block_requests(&server).await;
    assert!(requested.len() <= 3, "{requested:?}");
    assert!(!output.exists());
}
