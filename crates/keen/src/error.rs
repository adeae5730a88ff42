// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the Keen SDK.

use keen_common_http::RetryableError;
use keen_core::{KeyKind, ServiceError, ServiceErrorKind, ValidationError};
use thiserror::Error;

use crate::cache::{CacheError, PartialAddError};
use crate::record::CachedEvent;
use crate::settings::SettingsError;
use crate::transport::TransportError;

/// Boxed error returned by dynamic property providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Keen SDK errors.
#[derive(Debug, Error)]
pub enum KeenError {
	/// Project settings are missing or malformed.
	#[error(transparent)]
	Settings(#[from] SettingsError),

	/// The operation needs a key the project was not configured with.
	#[error("no {0} key configured for this project")]
	MissingKey(KeyKind),

	/// A global property was registered under a malformed name.
	#[error("invalid global property name: {0}")]
	InvalidGlobalProperty(#[source] ValidationError),

	/// Base URL could not be parsed or cannot carry a path.
	#[error("invalid base URL: {0}")]
	InvalidBaseUrl(String),

	/// `submit_cached` or a cache query was used on a client without a cache.
	#[error("event cache is not configured")]
	CacheNotConfigured,

	/// Failed to construct the HTTP client.
	#[error("failed to build HTTP client: {0}")]
	HttpClient(#[source] reqwest::Error),

	/// Collection name, property name, event shape, or query is malformed.
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// A global property is null or its provider failed.
	#[error(transparent)]
	Property(#[from] PropertyError),

	/// The caller's event could not be converted to JSON.
	#[error("event serialization failed: {0}")]
	Serialization(#[from] serde_json::Error),

	/// Immediate delivery of a single request failed.
	#[error(transparent)]
	Delivery(#[from] DeliveryError),

	/// One or more cached events failed during a drain.
	#[error("cached event submission failed: {0}")]
	CacheSubmission(FailedEvents),

	/// One or more events of an uncached bulk insert were rejected.
	#[error("bulk event submission failed: {0}")]
	BulkSubmission(FailedEvents),

	/// The event cache itself failed.
	#[error(transparent)]
	Cache(#[from] CacheError),

	/// A batch was only partly stored in the event cache.
	#[error(transparent)]
	PartialCache(PartialAddError),

	/// The blocking runtime could not be started.
	#[error("failed to start blocking runtime: {0}")]
	Runtime(#[source] std::io::Error),

	/// A blocking call failed without carrying a Keen error.
	#[error("blocking call failed: {0}")]
	Blocking(String),
}

impl KeenError {
	/// Returns true for errors caused by client setup rather than the call.
	pub fn is_configuration(&self) -> bool {
		matches!(
			self,
			KeenError::Settings(_)
				| KeenError::MissingKey(_)
				| KeenError::InvalidGlobalProperty(_)
				| KeenError::InvalidBaseUrl(_)
				| KeenError::CacheNotConfigured
				| KeenError::HttpClient(_)
		)
	}

	/// The failed events carried by an aggregate submission error.
	pub fn failed_events(&self) -> Option<&[CachedEvent]> {
		match self {
			KeenError::CacheSubmission(failed) | KeenError::BulkSubmission(failed) => {
				Some(failed.events())
			}
			_ => None,
		}
	}
}

/// Result type alias for Keen operations.
pub type Result<T> = std::result::Result<T, KeenError>;

/// Global property failures.
#[derive(Debug, Error)]
pub enum PropertyError {
	#[error("global property '{name}' has a null value")]
	NullValue { name: String },

	#[error("global property '{name}' is already registered")]
	AlreadyRegistered { name: String },

	#[error("dynamic property '{name}' produced null")]
	ProviderReturnedNull { name: String },

	#[error("dynamic property '{name}' failed: {source}")]
	ProviderFailed {
		name: String,
		#[source]
		source: BoxError,
	},
}

/// Failure of a single delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// The response body carried an `error_code`, whatever the status.
	#[error("service error {0}")]
	Service(ServiceError),

	/// The response status was not a success and the body named no error.
	#[error("server returned status {status}: {message}")]
	Status { status: u16, message: String },

	/// The response could not be interpreted.
	#[error("malformed response: {0}")]
	MalformedResponse(String),

	/// The request never produced a response.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

impl DeliveryError {
	pub fn service_kind(&self) -> Option<ServiceErrorKind> {
		match self {
			DeliveryError::Service(err) => Some(err.kind()),
			_ => None,
		}
	}

	pub fn status(&self) -> Option<u16> {
		match self {
			DeliveryError::Status { status, .. } => Some(*status),
			_ => None,
		}
	}
}

impl RetryableError for DeliveryError {
	fn is_retryable(&self) -> bool {
		match self {
			DeliveryError::Status { status, .. } => {
				matches!(*status, 429 | 408 | 500 | 502 | 503 | 504)
			}
			DeliveryError::Service(err) => err.kind() == ServiceErrorKind::InternalServer,
			DeliveryError::Transport(err) => err.is_retryable(),
			DeliveryError::MalformedResponse(_) => false,
		}
	}
}

/// Events that failed to submit, each carrying its own delivery error.
#[derive(Debug)]
pub struct FailedEvents {
	events: Vec<CachedEvent>,
	interrupted: Option<CacheError>,
}

impl FailedEvents {
	pub(crate) fn new(events: Vec<CachedEvent>) -> Self {
		Self {
			events,
			interrupted: None,
		}
	}

	pub(crate) fn interrupted_by(mut self, err: CacheError) -> Self {
		self.interrupted = Some(err);
		self
	}

	/// The cache failure that stopped a drain early. When set, records may
	/// still be waiting in the cache.
	pub fn interruption(&self) -> Option<&CacheError> {
		self.interrupted.as_ref()
	}

	pub fn events(&self) -> &[CachedEvent] {
		&self.events
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn into_events(self) -> Vec<CachedEvent> {
		self.events
	}
}

impl std::fmt::Display for FailedEvents {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} event(s) failed", self.events.len())?;
		for event in &self.events {
			match event.error() {
				Some(err) => write!(f, "; {}: {}", event.destination(), err)?,
				None => write!(f, "; {}: unknown error", event.destination())?,
			}
		}
		if let Some(err) = &self.interrupted {
			write!(f, "; drain interrupted: {err}")?;
		}
		Ok(())
	}
}
