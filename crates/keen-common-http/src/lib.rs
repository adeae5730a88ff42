// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the Keen SDK.
//!
//! This crate provides:
//! - A pre-configured reqwest client builder carrying the SDK User-Agent
//! - Retry with exponential backoff for connection-level failures

mod client;
mod retry;

pub use client::{builder, new_client_with_timeout, user_agent, SDK_NAME, SDK_VERSION};
pub use retry::{retry, RetryConfig, RetryableError};
