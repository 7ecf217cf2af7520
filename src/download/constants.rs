//! Defaults shared by the download pipeline and the CLI.

use std::time::Duration;

/// HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// HTTP read timeout. Large PDF blocks can take minutes to render server-side.
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Total attempts per block, first one included.
pub const DEFAULT_MAX_TRIALS: u32 = 5;

/// Pages Gallica prepends to every PDF it renders.
pub const DEFAULT_PREAMBLE_PAGES: usize = 2;

/// Block size suggested to users; whole-range requests time out on big documents.
pub const RECOMMENDED_BLOCK_SIZE: u32 = 100;

/// Blocks fetched at once by default (sequential).
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Upper bound on concurrent block fetches.
pub const MAX_CONCURRENCY: usize = 16;

/// Minimum spacing between two requests to the same host.
pub const DEFAULT_REQUEST_SPACING: Duration = Duration::from_millis(1000);

/// Warning threshold for cumulative throttling delay per host.
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum Retry-After honoured (1 hour).
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);
