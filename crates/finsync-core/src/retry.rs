//! Retry with exponential backoff

use std::time::Duration;

use indicatif::ProgressBar;

use crate::error::SyncError;
use crate::shutdown::is_shutdown_requested;

/// Longest single wait between attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...), capped at [`MAX_BACKOFF`]
pub const fn backoff_duration(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt);
    if secs > MAX_BACKOFF.as_secs() {
        MAX_BACKOFF
    } else {
        Duration::from_secs(secs)
    }
}

/// Retry a fallible operation with exponential backoff.
///
/// On retryable errors, logs the failure, updates the progress bar, sleeps,
/// and retries up to `max_retries` times. A pending shutdown stops retrying.
///
/// Returns `Ok(T)` on first success, or the final `Err` on exhaustion / non-retryable error.
pub fn retry_with_backoff<T>(
    label: &str,
    max_retries: u32,
    pb: &ProgressBar,
    mut attempt_fn: impl FnMut() -> Result<T, SyncError>,
) -> Result<T, SyncError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() && !is_shutdown_requested() => {
                attempt += 1;
                pb.set_message(format!("retry {attempt}/{max_retries}..."));
                log::debug!("{label}: attempt {attempt}/{max_retries} failed: {e}, retrying...");
                std::thread::sleep(backoff_duration(attempt));
            }
            Err(e) => {
                log::debug!("{label}: giving up after {} attempt(s): {e}", attempt + 1);
                return Err(e);
            }
        }
    }
}
