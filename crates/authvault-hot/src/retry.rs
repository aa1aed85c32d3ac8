//! Reconnection backoff (spec.md §4.3 "Retry/reconnection").

/// `min(baseDelay * multiplier^attempt, 30000 ms)`, or `None` past
/// `max_retries` to abandon reconnection.
pub fn retry_strategy(
    attempt: u32,
    base_delay_ms: u64,
    multiplier: f64,
    max_retries: u32,
) -> Option<u64> {
    if attempt > max_retries {
        return None;
    }
    let scaled = base_delay_ms as f64 * multiplier.powi(attempt as i32);
    Some(scaled.min(30_000.0) as u64)
}
