//! Bounded-retry retrieval of one block's PDF rendering.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::events::{DownloadEvent, DownloadObserver, NoopObserver};
use super::plan::Block;
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::throttle::{HostThrottle, parse_retry_after};
use super::{DownloadError, Transport};
use crate::gallica::GallicaRoutes;
use crate::parser::Ark;

/// Result of fetching one block, success or not.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched {
        block: Block,
        payload: Vec<u8>,
        attempts: u32,
    },
    Failed {
        block: Block,
        /// Error of the last attempt.
        error: DownloadError,
        failure: FailureType,
        attempts: u32,
    },
}

impl FetchOutcome {
    #[must_use]
    pub fn block(&self) -> Block {
        match self {
            Self::Fetched { block, .. } | Self::Failed { block, .. } => *block,
        }
    }

    /// Attempts made, first one included.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fetched { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched { .. })
    }
}

/// Fetches blocks through a [`Transport`], retrying per [`RetryPolicy`].
pub struct BlockFetcher {
    transport: Arc<dyn Transport>,
    routes: GallicaRoutes,
    policy: RetryPolicy,
    throttle: Arc<HostThrottle>,
    observer: Arc<dyn DownloadObserver>,
}

impl std::fmt::Debug for BlockFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFetcher")
            .field("routes", &self.routes)
            .field("policy", &self.policy)
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

impl BlockFetcher {
    /// Default backoff, no throttling, no observer.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, routes: GallicaRoutes) -> Self {
        Self {
            transport,
            routes,
            policy: RetryPolicy::default(),
            throttle: Arc::new(HostThrottle::disabled()),
            observer: Arc::new(NoopObserver),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_throttle(mut self, throttle: Arc<HostThrottle>) -> Self {
        self.throttle = throttle;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DownloadObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn routes(&self) -> &GallicaRoutes {
        &self.routes
    }

    /// Fetches `block` of `ark` in at most `max_trials` attempts (0 counts as 1).
    ///
    /// Every attempt requests the same bounds. Each failed attempt is logged
    /// and reported to the observer before the next attempt or the final
    /// failure. A server `Retry-After` replaces the computed backoff.
    #[instrument(skip(self, ark), fields(ark = %ark, start = block.start(), count = block.count()))]
    pub async fn fetch(&self, ark: &Ark, block: Block, max_trials: u32) -> FetchOutcome {
        let policy = self.policy.budgeted(max_trials);
        let url = self.routes.pdf_block(ark, block);
        let mut attempt = 1;

        loop {
            self.throttle.acquire(&url).await;

            let error = match self.transport.get_bytes(&url).await {
                Ok(payload) => {
                    debug!(attempt, bytes = payload.len(), "block fetched");
                    return FetchOutcome::Fetched {
                        block,
                        payload,
                        attempts: attempt,
                    };
                }
                Err(error) => error,
            };

            let failure = classify_error(&error);
            warn!(
                attempt,
                max_attempts = policy.max_attempts(),
                ?failure,
                error = %error,
                "block attempt failed"
            );
            self.observer.on_event(&DownloadEvent::AttemptFailed {
                block,
                attempt,
                max_attempts: policy.max_attempts(),
                error: error.to_string(),
            });

            match policy.should_retry(failure, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    let delay = match error.retry_after().and_then(parse_retry_after) {
                        Some(server_delay) => {
                            self.throttle.defer(&url, server_delay).await;
                            server_delay
                        }
                        None => delay,
                    };
                    info!(next_attempt = next, delay_ms = delay.as_millis(), "retrying block");
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "giving up on block");
                    return FetchOutcome::Failed {
                        block,
                        error,
                        failure,
                        attempts: attempt,
                    };
                }
            }
        }
    }
}
