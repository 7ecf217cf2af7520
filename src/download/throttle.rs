//! Per-host request spacing and server-requested pauses.
//!
//! Gallica throttles aggressive clients. [`HostThrottle`] keeps a "next free
//! slot" per host: [`HostThrottle::acquire`] waits for it and books the next
//! one `spacing` later, and [`HostThrottle::defer`] pushes it out when the
//! server answers with `Retry-After`.
//!
//! ```
//! use std::time::Duration;
//! use gallica_core::download::HostThrottle;
//!
//! # async fn example() {
//! let throttle = HostThrottle::new(Duration::from_millis(500));
//! throttle.acquire("https://gallica.bnf.fr/ark:/12148/x/f1n100.pdf").await;
//! // waits ~500ms
//! throttle.acquire("https://gallica.bnf.fr/ark:/12148/x/f101n100.pdf").await;
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::{CUMULATIVE_DELAY_WARNING_THRESHOLD, MAX_RETRY_AFTER};

/// Spaces requests to the same host; safe to share behind `Arc`.
#[derive(Debug)]
pub struct HostThrottle {
    spacing: Duration,
    // Arc so the shard lock is released before awaiting the slot mutex.
    hosts: DashMap<String, Arc<HostSlot>>,
}

#[derive(Debug, Default)]
struct HostSlot {
    /// Earliest instant the next request may start; `None` before the first.
    next_free: Mutex<Option<Instant>>,
    waited_ms: AtomicU64,
}

impl HostSlot {
    #[allow(clippy::cast_possible_truncation)]
    fn add_wait(&self, wait: Duration) -> Duration {
        let wait_ms = wait.as_millis() as u64;
        let total = self.waited_ms.fetch_add(wait_ms, Ordering::SeqCst) + wait_ms;
        Duration::from_millis(total)
    }
}

impl HostThrottle {
    /// Creates a throttle enforcing `spacing` between requests to one host.
    #[must_use]
    pub fn new(spacing: Duration) -> Self {
        debug!(spacing_ms = spacing.as_millis(), "creating host throttle");
        Self {
            spacing,
            hosts: DashMap::new(),
        }
    }

    /// No spacing; only server-requested pauses are honoured.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.spacing.is_zero()
    }

    #[must_use]
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    fn slot(&self, host: &str) -> Arc<HostSlot> {
        self.hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(HostSlot::default()))
            .clone()
    }

    /// Waits until a request to `url`'s host may start, then books the slot.
    #[instrument(skip(self), fields(host))]
    pub async fn acquire(&self, url: &str) {
        let host = host_key(url);
        tracing::Span::current().record("host", host.as_str());
        let slot = self.slot(&host);

        let mut next_free = slot.next_free.lock().await;
        if let Some(ready_at) = *next_free {
            let now = Instant::now();
            if ready_at > now {
                let wait = ready_at - now;
                let total = slot.add_wait(wait);
                debug!(
                    wait_ms = wait.as_millis(),
                    total_ms = total.as_millis(),
                    "throttling request"
                );
                if total >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                    warn!(
                        host = %host,
                        total_secs = total.as_secs(),
                        "heavy throttling - the server may be under load"
                    );
                }
                tokio::time::sleep(wait).await;
            }
        }
        *next_free = Some(Instant::now() + self.spacing);
    }

    /// Keeps every request to `url`'s host waiting for at least `delay`.
    #[instrument(skip(self), fields(host))]
    pub async fn defer(&self, url: &str, delay: Duration) {
        let host = host_key(url);
        tracing::Span::current().record("host", host.as_str());
        let slot = self.slot(&host);

        let until = Instant::now() + delay;
        let mut next_free = slot.next_free.lock().await;
        if next_free.is_none_or(|current| current < until) {
            *next_free = Some(until);
        }
        debug!(delay_ms = delay.as_millis(), "server requested pause");
    }
}

/// Lowercased host of `url`, or `"unknown"` so malformed URLs still share a slot.
///
/// ```
/// use gallica_core::download::host_key;
///
/// assert_eq!(host_key("https://Gallica.BNF.fr/ark:/12148/x"), "gallica.bnf.fr");
/// assert_eq!(host_key("nonsense"), "unknown");
/// ```
#[must_use]
pub fn host_key(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a `Retry-After` value: delay seconds or an HTTP-date.
///
/// Negative values and past dates yield `None`; anything above one hour is
/// capped.
///
/// ```
/// use std::time::Duration;
/// use gallica_core::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After ignored");
            return None;
        };
        return Some(cap_retry_after(Duration::from_secs(seconds)));
    }

    let Ok(date) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After ignored");
        return None;
    };
    match date.duration_since(std::time::SystemTime::now()) {
        Ok(delay) => Some(cap_retry_after(delay)),
        Err(_) => {
            debug!(header_value, "Retry-After date already passed");
            None
        }
    }
}

fn cap_retry_after(delay: Duration) -> Duration {
    if delay > MAX_RETRY_AFTER {
        warn!(
            requested_secs = delay.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After above maximum, capping"
        );
        MAX_RETRY_AFTER
    } else {
        delay
    }
}
