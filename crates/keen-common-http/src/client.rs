// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP client construction with a consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// SDK name reported in the User-Agent.
pub const SDK_NAME: &str = "keen-rust";
/// SDK version reported in the User-Agent.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates a reqwest builder with the SDK User-Agent already set.
///
/// # Example
/// ```ignore
/// let client = keen_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Builds a client with the given request timeout.
pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	builder().timeout(timeout).build()
}

/// Returns the User-Agent string.
///
/// Format: `keen-rust/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"{}/{} ({}-{})",
		SDK_NAME,
		SDK_VERSION,
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_names_sdk_and_platform() {
		let ua = user_agent();
		assert!(ua.starts_with("keen-rust/"));
		assert!(ua.contains(std::env::consts::OS));
		assert!(ua.ends_with(')'));
	}

	#[test]
	fn client_with_timeout_builds() {
		assert!(new_client_with_timeout(Duration::from_secs(5)).is_ok());
	}
}
