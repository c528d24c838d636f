//! Cancellation-aware polling with exponential backoff.

use crate::DeliveryError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleeps for `duration` unless `cancel` fires first.
pub async fn sleep_or_cancel(
	duration: Duration,
	cancel: &CancellationToken,
) -> Result<(), DeliveryError> {
	tokio::select! {
		_ = cancel.cancelled() => Err(DeliveryError::Cancelled),
		_ = tokio::time::sleep(duration) => Ok(()),
	}
}

/// Calls `attempt` up to `max_attempts` times until it yields a value.
///
/// The first call happens immediately; the delay before each further call
/// starts at `initial` and doubles. Errors from `attempt` are logged and
/// count as an unsuccessful attempt. Exhausting the budget returns
/// [`DeliveryError::NotFilled`].
pub async fn poll_with_backoff<T, F, Fut>(
	max_attempts: u32,
	initial: Duration,
	cancel: &CancellationToken,
	mut attempt: F,
) -> Result<T, DeliveryError>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = Result<Option<T>, DeliveryError>>,
{
	let mut delay = initial;
	for n in 1..=max_attempts {
		if cancel.is_cancelled() {
			return Err(DeliveryError::Cancelled);
		}
		match attempt(n).await {
			Ok(Some(value)) => return Ok(value),
			Ok(None) => {},
			Err(e) => tracing::warn!(attempt = n, error = %e, "Poll attempt failed"),
		}
		if n < max_attempts {
			sleep_or_cancel(delay, cancel).await?;
			delay = delay.saturating_mul(2);
		}
	}
	Err(DeliveryError::NotFilled(max_attempts))
}
