//! Payloads that are not the PDF we asked for must never reach the output.

use std::sync::Arc;

use gallica_core::download::{
    AssemblyError, BlockFetcher, DownloadOrchestrator, DownloadRequest, DownloadState,
    HttpClient, OrchestratorError, RetryPolicy,
};
use gallica_core::gallica::{GallicaClient, GallicaRoutes};
use gallica_core::Ark;
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::gallica::{ARK, NAME, mount_pagination, sample_pdf};
use crate::support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

fn orchestrator(server: &MockServer) -> DownloadOrchestrator {
    let transport = Arc::new(HttpClient::new().expect("http client"));
    let routes = GallicaRoutes::new(&server.uri()).expect("routes");
    let metadata = Arc::new(GallicaClient::new(transport.clone(), routes.clone()));
    DownloadOrchestrator::new(
        metadata,
        BlockFetcher::new(transport, routes).with_policy(RetryPolicy::immediate(1)),
    )
}

async fn serve_block(server: &MockServer, qualifier: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path_regex(format!(r"^/ark:/12148/{NAME}/{qualifier}\.pdf$")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

async fn run_two_blocks(server: &MockServer, second: Vec<u8>) -> (OrchestratorError, TempDir) {
    mount_pagination(server, 20).await;
    serve_block(server, "f1n10", sample_pdf("f1", 12)).await;
    serve_block(server, "f11n10", second).await;

    let dir = TempDir::new().expect("temp dir");
    let request = DownloadRequest::new(Ark::parse(ARK).expect("ark"), dir.path().join("book.pdf"))
        .with_block_size(Some(10));
    let err = orchestrator(server)
        .run(&request)
        .await
        .expect_err("corrupt block must fail");
    (err, dir)
}

fn assert_clean(dir: &TempDir) {
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn p0_html_error_page_rejected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    let (err, dir) = run_two_blocks(&server, b"<html><body>Service indisponible</body></html>".to_vec()).await;

    assert!(
        matches!(
            err,
            OrchestratorError::Assembly(AssemblyError::Malformed { index: 1, .. })
        ),
        "{err:?}"
    );
    assert_eq!(err.failed_in(), DownloadState::Assembling);
    assert_clean(&dir);
}

#[tokio::test]
async fn p0_truncated_pdf_rejected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    let mut truncated = sample_pdf("f11", 12);
    // Header and first objects only: no xref table, no trailer.
    truncated.truncate(200);
    let (err, dir) = run_two_blocks(&server, truncated).await;

    assert!(matches!(err, OrchestratorError::Assembly(_)), "{err:?}");
    assert_clean(&dir);
}

#[tokio::test]
async fn p0_block_shorter_than_preamble_rejected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    let (err, dir) = run_two_blocks(&server, sample_pdf("f11", 1)).await;

    assert!(
        matches!(
            err,
            OrchestratorError::Assembly(AssemblyError::Truncated {
                index: 1,
                pages: 1,
                ..
            })
        ),
        "{err:?}"
    );
    assert_clean(&dir);
}
