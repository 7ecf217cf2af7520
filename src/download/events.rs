//! Download lifecycle states and the progress events emitted along the way.

use std::fmt;

use serde::Serialize;

use super::plan::Block;

/// Lifecycle of one download invocation.
///
/// ```text
/// Planning -> Fetching -> Assembling -> Done
///     \__________\____________\_______> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    Planning,
    Fetching,
    Assembling,
    Done,
    Failed,
}

impl DownloadState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Planning, Self::Fetching)
            | (Self::Fetching, Self::Assembling)
            | (Self::Assembling, Self::Done) => true,
            (current, Self::Failed) => !current.is_terminal(),
            _ => false,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Fetching => "fetching",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    StateChanged(DownloadState),
    Planned {
        first_view: u32,
        last_view: u32,
        blocks: usize,
    },
    /// One attempt failed; reported before the retry or the final failure.
    AttemptFailed {
        block: Block,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    BlockFetched {
        index: usize,
        block: Block,
        bytes: usize,
        attempts: u32,
    },
    Completed {
        pages: usize,
        bytes: usize,
    },
}

/// Receives [`DownloadEvent`]s. Called inline, so implementations must be quick.
pub trait DownloadObserver: Send + Sync {
    fn on_event(&self, event: &DownloadEvent);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {
    fn on_event(&self, _event: &DownloadEvent) {}
}
