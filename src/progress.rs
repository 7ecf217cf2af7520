//! Spinner showing download progress on stderr.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use gallica_core::download::{DownloadEvent, DownloadObserver};
use indicatif::{ProgressBar, ProgressStyle};

/// [`DownloadObserver`] driving an indicatif spinner.
pub(crate) struct SpinnerObserver {
    spinner: ProgressBar,
    blocks: AtomicUsize,
    fetched: AtomicUsize,
}

impl SpinnerObserver {
    /// Visible spinner when `enabled`, otherwise a hidden one.
    pub(crate) fn new(enabled: bool) -> Self {
        let spinner = if enabled {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        } else {
            ProgressBar::hidden()
        };
        Self {
            spinner,
            blocks: AtomicUsize::new(0),
            fetched: AtomicUsize::new(0),
        }
    }

    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    fn describe(&self, event: &DownloadEvent) -> Option<String> {
        let total = self.blocks.load(Ordering::SeqCst);
        match event {
            DownloadEvent::StateChanged(state) => Some(format!("{state}...")),
            DownloadEvent::Planned {
                first_view,
                last_view,
                blocks,
            } => {
                self.blocks.store(*blocks, Ordering::SeqCst);
                Some(format!(
                    "views {first_view}-{last_view} in {blocks} block(s)"
                ))
            }
            DownloadEvent::AttemptFailed {
                block,
                attempt,
                max_attempts,
                ..
            } => Some(format!(
                "[{}/{total}] {block}: attempt {attempt}/{max_attempts} failed",
                self.fetched.load(Ordering::SeqCst)
            )),
            DownloadEvent::BlockFetched { block, .. } => {
                let done = self.fetched.fetch_add(1, Ordering::SeqCst) + 1;
                Some(format!("[{done}/{total}] fetched {block}"))
            }
            DownloadEvent::Completed { .. } => None,
        }
    }
}

impl DownloadObserver for SpinnerObserver {
    fn on_event(&self, event: &DownloadEvent) {
        if let Some(message) = self.describe(event) {
            self.spinner.set_message(message);
        }
    }
}
