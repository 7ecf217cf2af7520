//! One download, end to end: plan, fetch every block, assemble, commit.
//!
//! The orchestrator is all-or-nothing. Blocks are staged in a temporary
//! directory beside the output; the first block that exhausts its retries
//! aborts the download, cancels the fetches still in flight and removes the
//! staging directory. The output path is only ever touched by the final
//! rename.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::{StreamExt, stream};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::assembler::{AssembledDocument, AssemblyError, PdfAssembler};
use super::constants::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_TRIALS, DEFAULT_PREAMBLE_PAGES, MAX_CONCURRENCY,
};
use super::events::{DownloadEvent, DownloadObserver, DownloadState, NoopObserver};
use super::fetcher::{BlockFetcher, FetchOutcome};
use super::plan::{Block, BlockPlan, PlanningError, partition};
use super::staging::{StagingArea, StagingError};
use super::DownloadError;
use crate::gallica::MetadataClient;
use crate::parser::Ark;

/// Views to download, 1-indexed and inclusive.
///
/// Without an `end` the document's last view is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewRange {
    pub start: u32,
    pub end: Option<u32>,
}

impl Default for ViewRange {
    fn default() -> Self {
        Self { start: 1, end: None }
    }
}

/// Parameters of one download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub ark: Ark,
    pub range: ViewRange,
    /// Views per block; `None` requests the whole range at once.
    pub block_size: Option<u32>,
    /// Attempts per block, first one included.
    pub max_trials: u32,
    pub output: PathBuf,
}

impl DownloadRequest {
    /// Whole document, single block, default trials.
    #[must_use]
    pub fn new(ark: Ark, output: impl Into<PathBuf>) -> Self {
        Self {
            ark,
            range: ViewRange::default(),
            block_size: None,
            max_trials: DEFAULT_MAX_TRIALS,
            output: output.into(),
        }
    }

    #[must_use]
    pub fn with_range(mut self, start: u32, end: Option<u32>) -> Self {
        self.range = ViewRange { start, end };
        self
    }

    #[must_use]
    pub fn with_block_size(mut self, block_size: Option<u32>) -> Self {
        self.block_size = block_size;
        self
    }

    #[must_use]
    pub fn with_max_trials(mut self, max_trials: u32) -> Self {
        self.max_trials = max_trials;
        self
    }
}

/// Summary of a completed download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub ark: String,
    pub first_view: u32,
    pub last_view: u32,
    pub blocks: usize,
    pub pages: usize,
    pub bytes: usize,
    /// Requests made across all blocks, retries included.
    pub attempts: u32,
    pub output: PathBuf,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error("block {index} ({block}) failed after {attempts} attempt(s): {source}")]
    BlockFailed {
        index: usize,
        block: Block,
        attempts: u32,
        #[source]
        source: DownloadError,
    },

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("assembly task did not complete: {0}")]
    AssemblyTask(#[source] tokio::task::JoinError),

    #[error("staging failed while {stage}: {source}")]
    Staging {
        stage: DownloadState,
        #[source]
        source: StagingError,
    },

    #[error("concurrency must be between 1 and {max}, got {value}")]
    InvalidConcurrency { value: usize, max: usize },
}

impl OrchestratorError {
    /// State the download was in when this error ended it.
    #[must_use]
    pub fn failed_in(&self) -> DownloadState {
        match self {
            Self::Planning(_) | Self::InvalidConcurrency { .. } => DownloadState::Planning,
            Self::BlockFailed { .. } => DownloadState::Fetching,
            Self::Assembly(_) | Self::AssemblyTask(_) => DownloadState::Assembling,
            Self::Staging { stage, .. } => *stage,
        }
    }

    fn staging(stage: DownloadState, source: StagingError) -> Self {
        Self::Staging { stage, source }
    }
}

/// Emits `StateChanged` for every legal transition.
struct StateTracker<'a> {
    current: DownloadState,
    observer: &'a dyn DownloadObserver,
}

impl<'a> StateTracker<'a> {
    fn start(observer: &'a dyn DownloadObserver) -> Self {
        observer.on_event(&DownloadEvent::StateChanged(DownloadState::Planning));
        Self {
            current: DownloadState::Planning,
            observer,
        }
    }

    fn advance(&mut self, next: DownloadState) {
        if !self.current.can_transition_to(next) {
            warn!(from = %self.current, to = %next, "ignoring illegal state transition");
            return;
        }
        debug!(from = %self.current, to = %next, "state transition");
        self.current = next;
        self.observer.on_event(&DownloadEvent::StateChanged(next));
    }
}

/// Drives downloads. Holds no per-download state, so one instance can run
/// any number of requests.
pub struct DownloadOrchestrator {
    metadata: Arc<dyn MetadataClient>,
    fetcher: BlockFetcher,
    preamble_pages: usize,
    strict: bool,
    concurrency: usize,
    observer: Arc<dyn DownloadObserver>,
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("fetcher", &self.fetcher)
            .field("preamble_pages", &self.preamble_pages)
            .field("strict", &self.strict)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl DownloadOrchestrator {
    /// Sequential fetching, default preamble, lenient assembly.
    #[must_use]
    pub fn new(metadata: Arc<dyn MetadataClient>, fetcher: BlockFetcher) -> Self {
        Self {
            metadata,
            fetcher,
            preamble_pages: DEFAULT_PREAMBLE_PAGES,
            strict: false,
            concurrency: DEFAULT_CONCURRENCY,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Blocks fetched at the same time, `1..=MAX_CONCURRENCY`.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::InvalidConcurrency`] outside that range.
    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, OrchestratorError> {
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(OrchestratorError::InvalidConcurrency {
                value: concurrency,
                max: MAX_CONCURRENCY,
            });
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    #[must_use]
    pub fn with_preamble_pages(mut self, preamble_pages: usize) -> Self {
        self.preamble_pages = preamble_pages;
        self
    }

    /// Require every block to carry exactly `preamble + views` pages.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Observer for state changes, fetch attempts and completion.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DownloadObserver>) -> Self {
        self.fetcher = self.fetcher.with_observer(Arc::clone(&observer));
        self.observer = observer;
        self
    }

    /// Runs one download to completion.
    ///
    /// On success the assembled PDF is at `request.output`. On failure
    /// nothing was written there and the staging directory is gone.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError`]; [`OrchestratorError::failed_in`] tells which
    /// phase failed.
    #[instrument(skip(self, request), fields(ark = %request.ark, output = %request.output.display()))]
    pub async fn run(&self, request: &DownloadRequest) -> Result<DownloadReport, OrchestratorError> {
        let mut state = StateTracker::start(self.observer.as_ref());
        match self.drive(request, &mut state).await {
            Ok(report) => {
                state.advance(DownloadState::Done);
                info!(pages = report.pages, bytes = report.bytes, "download complete");
                Ok(report)
            }
            Err(error) => {
                warn!(failed_in = %error.failed_in(), error = %error, "download failed");
                state.advance(DownloadState::Failed);
                Err(error)
            }
        }
    }

    async fn drive(
        &self,
        request: &DownloadRequest,
        state: &mut StateTracker<'_>,
    ) -> Result<DownloadReport, OrchestratorError> {
        let plan = self.plan(request).await?;
        let (first_view, last_view) = match (plan.first_view(), plan.last_view()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(PlanningError::EmptyResource {
                    ark: request.ark.to_string(),
                }
                .into());
            }
        };
        self.observer.on_event(&DownloadEvent::Planned {
            first_view,
            last_view,
            blocks: plan.len(),
        });

        let staging = StagingArea::create(&request.output)
            .map_err(|e| OrchestratorError::staging(DownloadState::Planning, e))?;

        state.advance(DownloadState::Fetching);
        let attempts = self.fetch_all(request, &plan, &staging).await?;

        state.advance(DownloadState::Assembling);
        let document = self.assemble(&plan, &staging).await?;
        let AssembledDocument { bytes, page_count } = document;
        let output = staging
            .commit(&bytes)
            .await
            .map_err(|e| OrchestratorError::staging(DownloadState::Assembling, e))?;

        self.observer.on_event(&DownloadEvent::Completed {
            pages: page_count,
            bytes: bytes.len(),
        });

        Ok(DownloadReport {
            ark: request.ark.to_string(),
            first_view,
            last_view,
            blocks: plan.len(),
            pages: page_count,
            bytes: bytes.len(),
            attempts,
            output,
        })
    }

    #[instrument(skip(self, request), fields(start = request.range.start, end = ?request.range.end))]
    async fn plan(&self, request: &DownloadRequest) -> Result<BlockPlan, PlanningError> {
        let ViewRange { start, end } = request.range;
        if start == 0 {
            return Err(PlanningError::InvalidStart { start });
        }

        let (start, end) = match end {
            Some(end) => (start, end),
            None => {
                let total = self
                    .metadata
                    .page_count(&request.ark)
                    .await
                    .map_err(|source| PlanningError::PageCount {
                        ark: request.ark.to_string(),
                        source,
                    })?;
                if total == 0 {
                    return Err(PlanningError::EmptyResource {
                        ark: request.ark.to_string(),
                    });
                }
                (start.min(total), total)
            }
        };

        let block_size = request
            .block_size
            .unwrap_or_else(|| end.saturating_sub(start).saturating_add(1));
        let plan = partition(start, end, block_size)?;
        info!(
            first_view = start,
            last_view = end,
            blocks = plan.len(),
            block_size,
            "download planned"
        );
        Ok(plan)
    }

    /// Fetches and stages every block; returns the total number of attempts.
    async fn fetch_all(
        &self,
        request: &DownloadRequest,
        plan: &BlockPlan,
        staging: &StagingArea,
    ) -> Result<u32, OrchestratorError> {
        let ark = &request.ark;
        let max_trials = request.max_trials;
        let fetcher = &self.fetcher;

        let mut fetches = stream::iter(plan.iter().copied().enumerate())
            .map(|(index, block)| async move { (index, fetcher.fetch(ark, block, max_trials).await) })
            .buffer_unordered(self.concurrency);

        let mut attempts = 0;
        while let Some((index, outcome)) = fetches.next().await {
            match outcome {
                FetchOutcome::Fetched {
                    block,
                    payload,
                    attempts: used,
                } => {
                    attempts += used;
                    staging
                        .write_block(index, &payload)
                        .await
                        .map_err(|e| OrchestratorError::staging(DownloadState::Fetching, e))?;
                    self.observer.on_event(&DownloadEvent::BlockFetched {
                        index,
                        block,
                        bytes: payload.len(),
                        attempts: used,
                    });
                }
                FetchOutcome::Failed {
                    block,
                    error,
                    attempts: used,
                    ..
                } => {
                    // Returning drops `fetches`, which cancels the others.
                    return Err(OrchestratorError::BlockFailed {
                        index,
                        block,
                        attempts: used,
                        source: error,
                    });
                }
            }
        }
        Ok(attempts)
    }

    /// Reads every staged block, then merges them on the blocking pool.
    async fn assemble(
        &self,
        plan: &BlockPlan,
        staging: &StagingArea,
    ) -> Result<AssembledDocument, OrchestratorError> {
        let mut parts = Vec::with_capacity(plan.len());
        for (index, block) in plan.iter().copied().enumerate() {
            let payload = staging
                .read_block(index)
                .await
                .map_err(|e| OrchestratorError::staging(DownloadState::Assembling, e))?;
            parts.push((block, payload));
        }

        let assembler = PdfAssembler::new()
            .with_preamble_pages(self.preamble_pages)
            .strict(self.strict);
        let document = tokio::task::spawn_blocking(move || {
            let mut assembler = assembler;
            for (block, payload) in &parts {
                assembler.push(*block, payload)?;
            }
            assembler.finish()
        })
        .await
        .map_err(OrchestratorError::AssemblyTask)??;
        Ok(document)
    }
}
