// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Asynchronous Keen client.

use std::sync::Arc;
use std::time::Duration;

use keen_common_http::RetryConfig;
use keen_core::{ApiKey, CollectionName, KeyKind, Query};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::blocking::BlockingKeenClient;
use crate::cache::{EventCache, MemoryEventCache};
use crate::error::{DeliveryError, KeenError, Result};
use crate::global::{DynamicProperty, GlobalProperties, PropertyValue};
use crate::record::{build_event, AddOn, CachedEvent};
use crate::settings::{ProjectSettings, ProjectSettingsLayer};
use crate::submit;
use crate::transport::{HttpTransport, Method, Transport, TransportRequest};

/// Configuration for the HTTP side of the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Timeout for each HTTP request.
	pub request_timeout: Duration,
	/// Retry configuration for connection-level failures.
	pub retry_config: RetryConfig,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			request_timeout: Duration::from_secs(10),
			retry_config: RetryConfig::default(),
		}
	}
}

/// Builder for [`KeenClient`] and [`BlockingKeenClient`].
pub struct KeenClientBuilder {
	settings: ProjectSettingsLayer,
	config: ClientConfig,
	cache: Option<Arc<dyn EventCache>>,
	transport: Option<Arc<dyn Transport>>,
}

impl KeenClientBuilder {
	pub fn new() -> Self {
		Self {
			settings: ProjectSettingsLayer::default(),
			config: ClientConfig::default(),
			cache: None,
			transport: None,
		}
	}

	/// Uses `settings`; individual setters called afterwards override it.
	pub fn settings(mut self, settings: ProjectSettings) -> Self {
		self.settings.merge(settings.into());
		self
	}

	pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
		self.settings.project_id = Some(project_id.into());
		self
	}

	pub fn master_key(mut self, key: impl Into<String>) -> Self {
		self.settings.master_key = Some(ApiKey::new(key));
		self
	}

	pub fn write_key(mut self, key: impl Into<String>) -> Self {
		self.settings.write_key = Some(ApiKey::new(key));
		self
	}

	pub fn read_key(mut self, key: impl Into<String>) -> Self {
		self.settings.read_key = Some(ApiKey::new(key));
		self
	}

	pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
		self.settings.base_url = Some(base_url.into());
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	pub fn retry_config(mut self, retry_config: RetryConfig) -> Self {
		self.config.retry_config = retry_config;
		self
	}

	/// Enables caching: added events are stored in `cache` until
	/// [`KeenClient::submit_cached`] is called.
	pub fn event_cache(self, cache: impl EventCache + 'static) -> Self {
		self.shared_event_cache(Arc::new(cache))
	}

	pub fn shared_event_cache(mut self, cache: Arc<dyn EventCache>) -> Self {
		self.cache = Some(cache);
		self
	}

	/// Enables caching with an in-memory queue.
	pub fn memory_cache(self) -> Self {
		self.event_cache(MemoryEventCache::new())
	}

	/// Replaces the HTTP transport.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	pub fn build(self) -> Result<KeenClient> {
		let settings = self.settings.finalize()?;
		let http = HttpTransport::new(&settings.base_url, settings.project_id.clone(), &self.config)?;
		let transport = self.transport.unwrap_or_else(|| Arc::new(http));

		info!(
			project_id = %settings.project_id,
			base_url = %settings.base_url,
			caching = self.cache.is_some(),
			"Keen client initialized"
		);

		Ok(KeenClient {
			inner: Arc::new(ClientInner {
				settings,
				globals: GlobalProperties::new(),
				cache: self.cache,
				transport,
			}),
		})
	}

	/// Builds a client whose calls block the current thread.
	pub fn build_blocking(self) -> Result<BlockingKeenClient> {
		BlockingKeenClient::new(self.build()?)
	}
}

impl Default for KeenClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct ClientInner {
	settings: ProjectSettings,
	globals: GlobalProperties,
	cache: Option<Arc<dyn EventCache>>,
	transport: Arc<dyn Transport>,
}

/// Client for one Keen project.
///
/// Cloning is cheap; clones share global properties, cache, and transport.
///
/// # Example
///
/// ```no_run
/// use keen::{KeenClient, Properties};
///
/// # async fn example() -> keen::Result<()> {
/// let client = KeenClient::builder()
///     .project_id("my_project")
///     .write_key("my_write_key")
///     .memory_cache()
///     .build()?;
///
/// client.add_global_property("app_version", "1.4.0")?;
/// client
///     .add_event("purchases", &Properties::new().insert("item", "widget"))
///     .await?;
/// client.submit_cached().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct KeenClient {
	inner: Arc<ClientInner>,
}

impl KeenClient {
	pub fn builder() -> KeenClientBuilder {
		KeenClientBuilder::new()
	}

	pub fn project_id(&self) -> &str {
		&self.inner.settings.project_id
	}

	pub fn is_caching(&self) -> bool {
		self.inner.cache.is_some()
	}

	pub fn global_properties(&self) -> &GlobalProperties {
		&self.inner.globals
	}

	/// Adds a property merged into every event this client builds.
	pub fn add_global_property(&self, name: &str, value: impl Into<Value>) -> Result<()> {
		self.inner
			.globals
			.register(name, PropertyValue::Static(value.into()))
	}

	/// Adds a property whose value is computed for every event.
	///
	/// The provider is called once now; registration fails if it errors or
	/// returns null.
	pub fn add_dynamic_property(
		&self,
		name: &str,
		provider: impl DynamicProperty + 'static,
	) -> Result<()> {
		self.inner
			.globals
			.register(name, PropertyValue::dynamic(provider))
	}

	/// Adds an event to `collection`.
	///
	/// With caching enabled the event is stored for [`Self::submit_cached`].
	/// Otherwise it is sent now and any delivery failure is returned.
	pub async fn add_event<T>(&self, collection: &str, event: &T) -> Result<()>
	where
		T: Serialize + ?Sized,
	{
		self.add_event_with_addons(collection, event, &[]).await
	}

	/// Adds an event with data enrichment add-ons.
	pub async fn add_event_with_addons<T>(
		&self,
		collection: &str,
		event: &T,
		addons: &[AddOn],
	) -> Result<()>
	where
		T: Serialize + ?Sized,
	{
		let key = self.key(KeyKind::Write)?;
		let record = build_event(collection, event, addons, &self.inner.globals)?;

		match &self.inner.cache {
			Some(cache) => {
				debug!(collection = %record.destination(), "Caching event");
				cache.add(record).await?;
			}
			None => {
				submit::deliver(self.inner.transport.as_ref(), &record, key).await?;
				debug!(collection = %record.destination(), "Event delivered");
			}
		}
		Ok(())
	}

	/// Adds several events, possibly to different collections.
	///
	/// Every event is built before any is cached or sent; one invalid event
	/// rejects the whole call. With caching the batch goes to
	/// [`EventCache::add_all`]; a cache that stores only part of it yields
	/// [`KeenError::PartialCache`] naming how many were kept. Without caching the events go out in a single
	/// bulk request and rejected events are reported in
	/// [`KeenError::BulkSubmission`].
	pub async fn add_events<I, C, T>(&self, events: I) -> Result<()>
	where
		I: IntoIterator<Item = (C, T)>,
		C: AsRef<str>,
		T: Serialize,
	{
		let key = self.key(KeyKind::Write)?;
		let records = events
			.into_iter()
			.map(|(collection, event)| {
				build_event(collection.as_ref(), &event, &[], &self.inner.globals)
			})
			.collect::<Result<Vec<CachedEvent>>>()?;

		match &self.inner.cache {
			Some(cache) => {
				let count = records.len();
				cache.add_all(records).await.map_err(|err| {
					if err.accepted == 0 {
						KeenError::Cache(err.source)
					} else {
						KeenError::PartialCache(err)
					}
				})?;
				debug!(count, "Cached events");
				Ok(())
			}
			None => submit::deliver_bulk(self.inner.transport.as_ref(), records, key).await,
		}
	}

	/// Sends every cached event.
	///
	/// The cache is emptied whatever the outcome. Events that failed are
	/// returned in [`KeenError::CacheSubmission`], each with its error.
	/// Concurrent calls on one cache are not supported.
	pub async fn submit_cached(&self) -> Result<()> {
		let cache = self.cache()?;
		let key = self.key(KeyKind::Write)?;
		submit::drain(self.inner.transport.as_ref(), cache, key)
			.await
			.map(|_| ())
	}

	/// Number of events waiting in the cache.
	pub async fn cached_len(&self) -> Result<usize> {
		Ok(self.cache()?.len().await?)
	}

	/// Drops every cached event without sending it.
	pub async fn clear_cache(&self) -> Result<usize> {
		Ok(self.cache()?.clear().await?)
	}

	/// Deletes a collection and all of its events. Needs the master key.
	pub async fn delete_collection(&self, collection: &str) -> Result<()> {
		let key = self.key(KeyKind::Master)?;
		let collection = CollectionName::new(collection)?;

		let request = TransportRequest::new(Method::Delete, key.clone())
			.segment("events")
			.segment(collection.as_str());
		self.send(request).await?;

		info!(collection = %collection, "Deleted collection");
		Ok(())
	}

	/// Returns the inferred schema of a collection. Needs the master key.
	pub async fn get_schema(&self, collection: &str) -> Result<Value> {
		let key = self.key(KeyKind::Master)?;
		let collection = CollectionName::new(collection)?;

		let request = TransportRequest::new(Method::Get, key.clone())
			.segment("events")
			.segment(collection.as_str());
		self.send(request).await
	}

	/// Returns the schemas of every collection in the project. Needs the
	/// master key.
	pub async fn get_schemas(&self) -> Result<Value> {
		let key = self.key(KeyKind::Master)?;
		let request = TransportRequest::new(Method::Get, key.clone()).segment("events");
		self.send(request).await
	}

	/// Runs an analysis query and returns its `result`.
	pub async fn query(&self, query: &Query) -> Result<Value> {
		let key = self.key(KeyKind::Read)?;
		let params = query.to_params()?;

		let request = TransportRequest::new(Method::Get, key.clone())
			.segment("queries")
			.segment(query.analysis.as_str())
			.query(params);
		let mut body = self.send(request).await?;

		body.get_mut("result").map(Value::take).ok_or_else(|| {
			DeliveryError::MalformedResponse("query response has no result".to_string()).into()
		})
	}

	async fn send(&self, request: TransportRequest) -> Result<Value> {
		Ok(submit::send(self.inner.transport.as_ref(), request).await?)
	}

	fn key(&self, kind: KeyKind) -> Result<&ApiKey> {
		self.inner
			.settings
			.key(kind)
			.ok_or(KeenError::MissingKey(kind))
	}

	fn cache(&self) -> Result<&dyn EventCache> {
		self.inner
			.cache
			.as_deref()
			.ok_or(KeenError::CacheNotConfigured)
	}
}

impl std::fmt::Debug for KeenClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KeenClient")
			.field("project_id", &self.inner.settings.project_id)
			.field("base_url", &self.inner.settings.base_url)
			.field("caching", &self.is_caching())
			.finish()
	}
}
