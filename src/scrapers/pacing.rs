//! Cancellable delays.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Sleep for `delay` unless `cancel` fires first.
///
/// Checks cancellation before and after the sleep. Returns `false` when the
/// caller should stop.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if !delay.is_zero() {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    !cancel.is_cancelled()
}
