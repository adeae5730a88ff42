// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rust SDK for the Keen analytics service.
//!
//! This crate provides a client for sending events to a Keen project,
//! administering its collections, and running analysis queries. Events can
//! be sent as they are added, or cached locally and submitted later in one
//! drain.
//!
//! # Quick Start
//!
//! ```ignore
//! use keen::{KeenClient, Properties};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KeenClient::builder()
//!         .project_id("5f1e...")
//!         .write_key("write_key_xxx")
//!         .memory_cache()
//!         .build()?;
//!
//!     // Merged into every event
//!     client.add_global_property("app_version", "1.4.0")?;
//!     client.add_dynamic_property("sent_at", || -> Result<serde_json::Value, std::io::Error> {
//!         Ok(chrono::Utc::now().to_rfc3339().into())
//!     })?;
//!
//!     client.add_event("purchases", &Properties::new()
//!         .insert("item", "golden widget")
//!         .insert("price", 25.5)
//!     ).await?;
//!
//!     client.submit_cached().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Caching
//!
//! With an [`EventCache`] attached, `add_event` only stores the fully built
//! event. `submit_cached` then takes every stored event, sends them one by
//! one, and keeps going past failures. The cache is always empty afterwards.
//! If any event failed the call returns [`KeenError::CacheSubmission`]
//! listing exactly those events, each with its own [`DeliveryError`]:
//!
//! ```ignore
//! match client.submit_cached().await {
//!     Ok(()) => {}
//!     Err(KeenError::CacheSubmission(failed)) => {
//!         for event in failed.events() {
//!             eprintln!("{}: {:?}", event.destination(), event.error());
//!         }
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! ```
//!
//! Without a cache, events are sent immediately and delivery errors are
//! returned from `add_event` itself.
//!
//! # API Keys
//!
//! | Key | Grants |
//! |-----|--------|
//! | Write | adding events |
//! | Read | queries |
//! | Master | everything, including deleting collections and reading schemas |
//!
//! The master key stands in for a missing write or read key.
//!
//! # Blocking Use
//!
//! [`KeenClientBuilder::build_blocking`] returns a [`BlockingKeenClient`]
//! with the same operations as plain functions. Errors come back exactly as
//! the async client reports them.

pub mod blocking;
pub mod cache;
pub mod client;
pub mod error;
pub mod global;
pub mod properties;
pub mod record;
pub mod settings;
mod submit;
#[cfg(test)]
mod testing;
pub mod transport;

pub use blocking::BlockingKeenClient;
pub use cache::{CacheError, EventCache, MemoryEventCache, PartialAddError};
pub use client::{ClientConfig, KeenClient, KeenClientBuilder};
pub use error::{BoxError, DeliveryError, FailedEvents, KeenError, PropertyError, Result};
pub use global::{DynamicProperty, GlobalProperties, PropertyValue};
pub use properties::Properties;
pub use record::{AddOn, CachedEvent};
pub use settings::{ProjectSettings, SettingsError, DEFAULT_BASE_URL};
pub use transport::{
	HttpTransport, Method, Transport, TransportError, TransportRequest, TransportResponse,
};

// Re-export types users may need
pub use keen_common_http::RetryConfig;
pub use keen_core::{
	ApiKey, CollectionName, Filter, FilterOperator, KeyKind, Query, QueryType, ServiceError,
	ServiceErrorKind, Timeframe, ValidationError,
};
