// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local storage for events awaiting submission.

use std::collections::VecDeque;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::record::CachedEvent;

/// Failure reported by an event cache implementation.
#[derive(Debug, Error)]
#[error("event cache failure: {0}")]
pub struct CacheError(pub String);

impl CacheError {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

/// A batch add that stopped partway through.
///
/// The first `accepted` records of the batch are stored; the rest are not.
#[derive(Debug, Error)]
#[error("{accepted} of {total} events were cached before the cache failed: {source}")]
pub struct PartialAddError {
	pub accepted: usize,
	pub total: usize,
	#[source]
	pub source: CacheError,
}

/// Storage for events added while caching is enabled.
///
/// `add` may be called concurrently from many producers. `try_take` must
/// return immediately; `Ok(None)` means the cache is empty. A taken record
/// is never returned again. Records should come back in insertion order.
#[async_trait::async_trait]
pub trait EventCache: Send + Sync {
	/// Stores a record.
	async fn add(&self, event: CachedEvent) -> Result<(), CacheError>;

	/// Stores a batch of records in order.
	///
	/// The default adds them one at a time and reports how many were stored
	/// if one fails. Implementations that can store a batch atomically
	/// should override it so a failure leaves nothing behind.
	async fn add_all(&self, events: Vec<CachedEvent>) -> Result<(), PartialAddError> {
		let total = events.len();
		for (accepted, event) in events.into_iter().enumerate() {
			self.add(event).await.map_err(|source| PartialAddError {
				accepted,
				total,
				source,
			})?;
		}
		Ok(())
	}

	/// Removes and returns the next record, if any.
	async fn try_take(&self) -> Result<Option<CachedEvent>, CacheError>;

	/// Discards every stored record, returning how many were dropped.
	async fn clear(&self) -> Result<usize, CacheError>;

	/// Number of stored records.
	async fn len(&self) -> Result<usize, CacheError>;
}

/// In-process FIFO cache. Records are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryEventCache {
	queue: Mutex<VecDeque<CachedEvent>>,
}

impl MemoryEventCache {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait::async_trait]
impl EventCache for MemoryEventCache {
	async fn add(&self, event: CachedEvent) -> Result<(), CacheError> {
		self.queue.lock().await.push_back(event);
		Ok(())
	}

	async fn add_all(&self, events: Vec<CachedEvent>) -> Result<(), PartialAddError> {
		self.queue.lock().await.extend(events);
		Ok(())
	}

	async fn try_take(&self) -> Result<Option<CachedEvent>, CacheError> {
		Ok(self.queue.lock().await.pop_front())
	}

	async fn clear(&self) -> Result<usize, CacheError> {
		let mut queue = self.queue.lock().await;
		let dropped = queue.len();
		queue.clear();
		Ok(dropped)
	}

	async fn len(&self) -> Result<usize, CacheError> {
		Ok(self.queue.lock().await.len())
	}
}
