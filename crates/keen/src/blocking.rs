// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Blocking wrapper around [`KeenClient`].
//!
//! Every call is spawned onto a runtime owned by the wrapper and the calling
//! thread waits for it, so the async path never runs on the thread that is
//! waiting. Calling from inside another runtime is safe but blocks that
//! runtime's thread for the duration of the call.

use std::any::Any;
use std::future::Future;

use keen_core::Query;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;
use tokio::task::JoinError;

use crate::client::KeenClient;
use crate::error::{KeenError, Result};
use crate::global::DynamicProperty;
use crate::record::AddOn;

/// A [`KeenClient`] whose methods block until they complete.
///
/// # Example
///
/// ```no_run
/// use keen::KeenClient;
/// use serde_json::json;
///
/// # fn example() -> keen::Result<()> {
/// let client = KeenClient::builder()
///     .project_id("my_project")
///     .write_key("my_write_key")
///     .memory_cache()
///     .build_blocking()?;
///
/// client.add_event("signups", &json!({"plan": "pro"}))?;
/// client.submit_cached()?;
/// # Ok(())
/// # }
/// ```
pub struct BlockingKeenClient {
	client: KeenClient,
	runtime: Option<Runtime>,
}

impl BlockingKeenClient {
	pub(crate) fn new(client: KeenClient) -> Result<Self> {
		let runtime = tokio::runtime::Builder::new_multi_thread()
			.worker_threads(1)
			.thread_name("keen-blocking")
			.enable_all()
			.build()
			.map_err(KeenError::Runtime)?;

		Ok(Self {
			client,
			runtime: Some(runtime),
		})
	}

	/// The async client this wrapper drives.
	pub fn client(&self) -> &KeenClient {
		&self.client
	}

	pub fn project_id(&self) -> &str {
		self.client.project_id()
	}

	pub fn add_global_property(&self, name: &str, value: impl Into<Value>) -> Result<()> {
		self.client.add_global_property(name, value)
	}

	pub fn add_dynamic_property(
		&self,
		name: &str,
		provider: impl DynamicProperty + 'static,
	) -> Result<()> {
		self.client.add_dynamic_property(name, provider)
	}

	pub fn add_event<T>(&self, collection: &str, event: &T) -> Result<()>
	where
		T: Serialize + ?Sized,
	{
		self.add_event_with_addons(collection, event, &[])
	}

	pub fn add_event_with_addons<T>(
		&self,
		collection: &str,
		event: &T,
		addons: &[AddOn],
	) -> Result<()>
	where
		T: Serialize + ?Sized,
	{
		let client = self.client.clone();
		let collection = collection.to_string();
		let event = serde_json::to_value(event)?;
		let addons = addons.to_vec();
		self.wait(async move {
			client
				.add_event_with_addons(&collection, &event, &addons)
				.await
		})
	}

	pub fn add_events<I, C, T>(&self, events: I) -> Result<()>
	where
		I: IntoIterator<Item = (C, T)>,
		C: AsRef<str>,
		T: Serialize,
	{
		let events = events
			.into_iter()
			.map(|(collection, event)| -> Result<(String, Value)> {
				Ok((collection.as_ref().to_string(), serde_json::to_value(&event)?))
			})
			.collect::<Result<Vec<(String, Value)>>>()?;

		let client = self.client.clone();
		self.wait(async move { client.add_events(events).await })
	}

	pub fn submit_cached(&self) -> Result<()> {
		let client = self.client.clone();
		self.wait(async move { client.submit_cached().await })
	}

	pub fn cached_len(&self) -> Result<usize> {
		let client = self.client.clone();
		self.wait(async move { client.cached_len().await })
	}

	pub fn clear_cache(&self) -> Result<usize> {
		let client = self.client.clone();
		self.wait(async move { client.clear_cache().await })
	}

	pub fn delete_collection(&self, collection: &str) -> Result<()> {
		let client = self.client.clone();
		let collection = collection.to_string();
		self.wait(async move { client.delete_collection(&collection).await })
	}

	pub fn get_schema(&self, collection: &str) -> Result<Value> {
		let client = self.client.clone();
		let collection = collection.to_string();
		self.wait(async move { client.get_schema(&collection).await })
	}

	pub fn get_schemas(&self) -> Result<Value> {
		let client = self.client.clone();
		self.wait(async move { client.get_schemas().await })
	}

	pub fn query(&self, query: &Query) -> Result<Value> {
		let client = self.client.clone();
		let query = query.clone();
		self.wait(async move { client.query(&query).await })
	}

	fn wait<F, T>(&self, future: F) -> Result<T>
	where
		F: Future<Output = Result<T>> + Send + 'static,
		T: Send + 'static,
	{
		let runtime = self
			.runtime
			.as_ref()
			.ok_or_else(|| KeenError::Blocking("runtime has shut down".to_string()))?;

		let handle = runtime.spawn(future);
		unwrap_join(futures::executor::block_on(handle))
	}
}

impl Drop for BlockingKeenClient {
	fn drop(&mut self) {
		if let Some(runtime) = self.runtime.take() {
			runtime.shutdown_background();
		}
	}
}

impl std::fmt::Debug for BlockingKeenClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BlockingKeenClient")
			.field("client", &self.client)
			.finish_non_exhaustive()
	}
}

/// Strips the join layer, preferring a [`KeenError`] wherever one exists.
fn unwrap_join<T>(joined: std::result::Result<Result<T>, JoinError>) -> Result<T> {
	let err = match joined {
		Ok(outcome) => return outcome,
		Err(err) => err,
	};

	if !err.is_panic() {
		return Err(KeenError::Blocking(err.to_string()));
	}

	match err.into_panic().downcast::<KeenError>() {
		Ok(inner) => Err(*inner),
		Err(payload) => Err(KeenError::Blocking(panic_message(payload.as_ref()))),
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		format!("task panicked: {message}")
	} else if let Some(message) = payload.downcast_ref::<String>() {
		format!("task panicked: {message}")
	} else {
		"task panicked".to_string()
	}
}
