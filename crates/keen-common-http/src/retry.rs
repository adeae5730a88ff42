// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry with exponential backoff.
//!
//! Only errors that report themselves as retryable are attempted again;
//! HTTP status handling stays with the caller, which sees every response.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff policy for retried operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts including the first one. Zero behaves like one.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// A policy that makes exactly one attempt.
	pub fn none() -> Self {
		Self {
			max_attempts: 1,
			..Self::default()
		}
	}

	/// Delay before the retry following the given zero-based failed attempt.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let exponential = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
		let capped = exponential.min(self.max_delay.as_secs_f64());

		let delay = if self.jitter {
			capped * (0.5 + fastrand::f64())
		} else {
			capped
		};

		Duration::from_secs_f64(delay)
	}
}

/// Errors that know whether another attempt could succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		self.is_timeout() || self.is_connect()
	}
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt budget is spent.
pub async fn retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: RetryableError + std::fmt::Debug,
{
	let max_attempts = config.max_attempts.max(1);
	let mut attempt = 0;

	loop {
		let err = match operation().await {
			Ok(value) => return Ok(value),
			Err(err) => err,
		};
		attempt += 1;

		if !err.is_retryable() || attempt >= max_attempts {
			if attempt > 1 {
				warn!(error = ?err, attempt, max_attempts, "giving up after retries");
			}
			return Err(err);
		}

		let delay = config.delay_for(attempt - 1);
		warn!(
			error = ?err,
			attempt,
			max_attempts,
			delay_ms = delay.as_millis() as u64,
			"retrying after transient error"
		);
		tokio::time::sleep(delay).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[derive(Debug)]
	struct FlakyError {
		retryable: bool,
	}

	impl RetryableError for FlakyError {
		fn is_retryable(&self) -> bool {
			self.retryable
		}
	}

	fn fast_config(max_attempts: u32) -> RetryConfig {
		RetryConfig {
			max_attempts,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(5),
			backoff_factor: 2.0,
			jitter: false,
		}
	}

	#[tokio::test]
	async fn non_retryable_error_is_returned_after_one_attempt() {
		let attempts = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&attempts);

		let result: Result<(), FlakyError> = retry(&fast_config(5), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(FlakyError { retryable: false })
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(attempts.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn retryable_error_exhausts_budget() {
		let attempts = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&attempts);

		let result: Result<(), FlakyError> = retry(&fast_config(3), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(FlakyError { retryable: true })
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(attempts.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn recovers_after_transient_failures() {
		let attempts = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&attempts);

		let result: Result<&str, FlakyError> = retry(&fast_config(4), || {
			let counter = Arc::clone(&counter);
			async move {
				if counter.fetch_add(1, Ordering::SeqCst) < 2 {
					Err(FlakyError { retryable: true })
				} else {
					Ok("delivered")
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), "delivered");
		assert_eq!(attempts.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn none_policy_makes_single_attempt() {
		let attempts = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&attempts);

		let _: Result<(), FlakyError> = retry(&RetryConfig::none(), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(FlakyError { retryable: true })
			}
		})
		.await;

		assert_eq!(attempts.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn delay_is_capped_at_max_delay() {
		let config = RetryConfig {
			max_attempts: 10,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(4),
			backoff_factor: 10.0,
			jitter: false,
		};

		for attempt in 0..8 {
			assert!(config.delay_for(attempt) <= Duration::from_secs(4));
		}
	}

	#[test]
	fn jitter_varies_delay() {
		let config = RetryConfig {
			jitter: true,
			..fast_config(3)
		};
		let delays: Vec<Duration> = (0..16).map(|_| config.delay_for(2)).collect();
		assert!(delays.windows(2).any(|w| w[0] != w[1]));
	}
}
