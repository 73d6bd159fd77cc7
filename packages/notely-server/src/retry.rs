//! Generic retry-with-backoff helper for transient storage errors
//! (spec.md §7: busy/locked SQLite retried with exponential backoff and
//! full jitter before bubbling up).

use std::time::Duration;

use notely_core::StoreError;
use rand::Rng;

/// Retries `f` up to `attempts` times while it returns a transient
/// [`StoreError`], backing off exponentially from `base_delay` with full
/// jitter between attempts. Non-transient errors return immediately.
pub async fn retry_with_backoff<T, F, Fut>(attempts: u32, base_delay: Duration, mut f: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut last_err = None;
    for attempt in 0..attempts {
        match f().await {
            Ok(value) => return Ok(value),
            Err(StoreError::Transient(msg)) => {
                last_err = Some(StoreError::Transient(msg));
                if attempt + 1 < attempts {
                    let cap_ms = base_delay.as_millis() as u64 * 2u64.pow(attempt);
                    let jittered = rand::rng().random_range(0..=cap_ms.max(1));
                    tokio::time::sleep(Duration::from_millis(jittered)).await;
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(last_err.expect("loop runs at least once when attempts > 0"))
}
