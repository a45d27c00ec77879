use std::thread;
use std::time::Duration;

/// Bounded, blocking retry for setup-time calls.
///
/// Steady-state polling must never sleep beyond its own interval; this
/// helper is reserved for process start, where a flaky first connection
/// should not abort the service.
pub fn with_retries<T, E, F>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(error) if attempt < attempts => {
                tracing::warn!(attempt, attempts, error = %error, "setup attempt failed");
                attempt += 1;
                thread::sleep(delay);
            }
            Err(error) => return Err(error),
        }
    }
}
