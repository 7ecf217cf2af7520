//! Block-wise PDF download of Gallica documents.
//!
//! A download goes through [`DownloadOrchestrator::run`]:
//!
//! 1. the view range is split into a [`BlockPlan`] ([`partition`]),
//! 2. each [`Block`] is fetched by the [`BlockFetcher`] with bounded retry,
//! 3. the blocks are merged by the [`PdfAssembler`], which drops the
//!    preamble Gallica prepends to every block but the first,
//! 4. the result is renamed onto the output path.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gallica_core::download::{BlockFetcher, DownloadOrchestrator, DownloadRequest, HttpClient};
//! use gallica_core::gallica::{GallicaClient, GallicaRoutes};
//! use gallica_core::parser::Ark;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpClient::new()?);
//! let routes = GallicaRoutes::default();
//! let metadata = Arc::new(GallicaClient::new(transport.clone(), routes.clone()));
//! let orchestrator = DownloadOrchestrator::new(metadata, BlockFetcher::new(transport, routes));
//!
//! let ark = Ark::parse("ark:/12148/bpt6k5619759j")?;
//! let request = DownloadRequest::new(ark, "book.pdf").with_block_size(Some(100));
//! let report = orchestrator.run(&request).await?;
//! println!("{} pages", report.pages);
//! # Ok(())
//! # }
//! ```

mod assembler;
mod client;
pub mod constants;
mod error;
mod events;
mod fetcher;
mod orchestrator;
mod plan;
mod retry;
mod staging;
mod throttle;

pub use assembler::{AssembledDocument, AssemblyError, PdfAssembler};
pub use client::{ClientSettings, HttpClient, Transport};
pub use constants::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_TRIALS, DEFAULT_PREAMBLE_PAGES, MAX_CONCURRENCY,
    RECOMMENDED_BLOCK_SIZE,
};
pub use error::DownloadError;
pub use events::{DownloadEvent, DownloadObserver, DownloadState, NoopObserver};
pub use fetcher::{BlockFetcher, FetchOutcome};
pub use orchestrator::{
    DownloadOrchestrator, DownloadReport, DownloadRequest, OrchestratorError, ViewRange,
};
pub use plan::{Block, BlockPlan, PlanningError, partition};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
pub use staging::{StagingArea, StagingError};
pub use throttle::{HostThrottle, host_key, parse_retry_after};
