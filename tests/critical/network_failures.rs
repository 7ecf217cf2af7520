//! Timeouts, refused connections and rate limiting. Retries must stay within
//! the trial budget and the final error must name the block.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gallica_core::download::{
    BlockFetcher, ClientSettings, DownloadError, DownloadOrchestrator, DownloadRequest,
    FetchOutcome, HttpClient, OrchestratorError, RetryPolicy,
};
use gallica_core::gallica::{GallicaClient, GallicaRoutes};
use gallica_core::{Ark, Block};
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, ResponseTemplate};

use crate::support::gallica::{ARK, BlockResponder, NAME, block_requests, mount_blocks, sample_pdf};
use crate::support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

fn ark() -> Ark {
    Ark::parse(ARK).expect("valid ark")
}

#[tokio::test]
async fn p0_read_timeout_is_retried_then_reported() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path_regex(r"\.pdf$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(sample_pdf("slow", 3))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = HttpClient::with_settings(&ClientSettings {
        connect_timeout: Duration::from_secs(1),
        read_timeout: Duration::from_millis(200),
        contact: None,
    })
    .expect("http client");
    let fetcher = BlockFetcher::new(
        Arc::new(client),
        GallicaRoutes::new(&server.uri()).expect("routes"),
    )
    .with_policy(RetryPolicy::immediate(2));

    let outcome = fetcher
        .fetch(&ark(), Block::new(1, 1).expect("block"), 2)
        .await;
    match outcome {
        FetchOutcome::Failed {
            error, attempts, ..
        } => {
            assert_eq!(attempts, 2);
            assert!(
                matches!(error, DownloadError::Timeout { .. } | DownloadError::Network { .. }),
                "unexpected error {error:?}"
            );
        }
        FetchOutcome::Fetched { .. } => panic!("slow server should time out"),
    }
}

#[tokio::test]
async fn p0_connection_refused_exhausts_trials() {
    // Port 1 on loopback is closed on any sane test host.
    let transport = Arc::new(HttpClient::new().expect("http client"));
    let routes = GallicaRoutes::new("http://127.0.0.1:1").expect("routes");
    let metadata = Arc::new(GallicaClient::new(transport.clone(), routes.clone()));
    let fetcher = BlockFetcher::new(transport, routes).with_policy(RetryPolicy::immediate(3));
    let orchestrator = DownloadOrchestrator::new(metadata, fetcher);

    let dir = TempDir::new().expect("temp dir");
    let output = dir.path().join("book.pdf");
    let request = DownloadRequest::new(ark(), &output)
        .with_range(1, Some(5))
        .with_max_trials(3);

    let err = orchestrator.run(&request).await.expect_err("nothing listens");
    assert!(
        matches!(err, OrchestratorError::BlockFailed { attempts: 3, index: 0, .. }),
        "{err:?}"
    );
    assert!(err.to_string().contains("views 1-5"), "{err}");
    assert!(!output.exists());
}

#[tokio::test]
async fn p0_retry_after_is_honoured() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path_regex(format!(r"^/ark:/12148/{NAME}/f1n5\.pdf$")))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_blocks(&server, BlockResponder::healthy()).await;

    // Backoff alone would wait a minute; the server asked for one second.
    let policy = RetryPolicy::new(3, Duration::from_secs(60), Duration::from_secs(60), 1.0)
        .with_jitter(Duration::ZERO);
    let fetcher = BlockFetcher::new(
        Arc::new(HttpClient::new().expect("http client")),
        GallicaRoutes::new(&server.uri()).expect("routes"),
    )
    .with_policy(policy);

    let started = Instant::now();
    let outcome = fetcher
        .fetch(&ark(), Block::new(1, 5).expect("block"), 3)
        .await;
    let elapsed = started.elapsed();

    assert!(outcome.is_fetched());
    assert_eq!(outcome.attempts(), 2);
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(20), "{elapsed:?}");
}

#[tokio::test]
async fn p0_not_found_uses_every_trial() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    mount_blocks(&server, BlockResponder::broken_block(1, 404)).await;

    let fetcher = BlockFetcher::new(
        Arc::new(HttpClient::new().expect("http client")),
        GallicaRoutes::new(&server.uri()).expect("routes"),
    )
    .with_policy(RetryPolicy::immediate(5));

    let outcome = fetcher
        .fetch(&ark(), Block::new(1, 10).expect("block"), 3)
        .await;
    assert!(!outcome.is_fetched());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(block_requests(&server).await, [(1, 10), (1, 10), (1, 10)]);
}

#[tokio::test]
async fn p0_forbidden_then_served_recovers() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    mount_blocks(&server, BlockResponder::flaky(2, 403)).await;

    let fetcher = BlockFetcher::new(
        Arc::new(HttpClient::new().expect("http client")),
        GallicaRoutes::new(&server.uri()).expect("routes"),
    )
    .with_policy(RetryPolicy::immediate(3));

    let outcome = fetcher
        .fetch(&ark(), Block::new(1, 10).expect("block"), 3)
        .await;
    assert!(outcome.is_fetched());
    assert_eq!(outcome.attempts(), 3);
}
