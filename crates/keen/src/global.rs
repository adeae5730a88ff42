// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Global properties merged into every event a client builds.
//!
//! A global property is either a plain JSON value or a [`DynamicProperty`]
//! that is re-evaluated for every event. The registry is append-only:
//! entries can be added but never removed or replaced.
//!
//! Readers work on an immutable snapshot, so materializing an event never
//! contends with a concurrent registration beyond one pointer clone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use keen_core::validate_property_name;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{BoxError, KeenError, PropertyError};

/// A value computed on demand, once per event.
///
/// Providers must not return `null`. They may return a different value on
/// every call; nothing is cached between events.
///
/// Any `Fn() -> Result<Value, E>` closure is a provider:
///
/// ```
/// use keen::DynamicProperty;
/// use serde_json::{json, Value};
///
/// let now = || -> Result<Value, std::io::Error> { Ok(json!(chrono::Utc::now().to_rfc3339())) };
/// assert!(now.value().is_ok());
/// ```
pub trait DynamicProperty: Send + Sync {
	fn value(&self) -> Result<Value, BoxError>;
}

impl<F, E> DynamicProperty for F
where
	F: Fn() -> Result<Value, E> + Send + Sync,
	E: Into<BoxError>,
{
	fn value(&self) -> Result<Value, BoxError> {
		self().map_err(Into::into)
	}
}

/// The value side of a global property.
#[derive(Clone)]
pub enum PropertyValue {
	Static(Value),
	Dynamic(Arc<dyn DynamicProperty>),
}

impl PropertyValue {
	pub fn dynamic(provider: impl DynamicProperty + 'static) -> Self {
		PropertyValue::Dynamic(Arc::new(provider))
	}
}

impl fmt::Debug for PropertyValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PropertyValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
			PropertyValue::Dynamic(_) => f.write_str("Dynamic(..)"),
		}
	}
}

impl From<Value> for PropertyValue {
	fn from(value: Value) -> Self {
		PropertyValue::Static(value)
	}
}

type Entries = BTreeMap<String, PropertyValue>;

/// Instance-scoped registry of global properties.
#[derive(Debug, Default)]
pub struct GlobalProperties {
	entries: RwLock<Arc<Entries>>,
}

impl GlobalProperties {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a global property.
	///
	/// The name must be a valid property name and not already registered.
	/// A static value must not be null. A dynamic provider is invoked once
	/// here to prove it works; the value it yields is discarded. Nothing is
	/// stored when any check fails.
	pub fn register(&self, name: &str, value: PropertyValue) -> Result<(), KeenError> {
		validate_property_name(name).map_err(KeenError::InvalidGlobalProperty)?;

		match &value {
			PropertyValue::Static(Value::Null) => {
				return Err(PropertyError::NullValue {
					name: name.to_string(),
				}
				.into())
			}
			PropertyValue::Static(_) => {}
			PropertyValue::Dynamic(provider) => {
				resolve(name, provider.as_ref())?;
			}
		}

		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
		if entries.contains_key(name) {
			return Err(PropertyError::AlreadyRegistered {
				name: name.to_string(),
			}
			.into());
		}

		let mut next = Entries::clone(&entries);
		let dynamic = matches!(value, PropertyValue::Dynamic(_));
		next.insert(name.to_string(), value);
		*entries = Arc::new(next);

		debug!(property = %name, dynamic, "Registered global property");
		Ok(())
	}

	/// Merges every global property into `payload`.
	///
	/// Dynamic providers are invoked now. A global property replaces an
	/// event property of the same name. If any provider fails the whole
	/// merge is abandoned and `payload` is dropped.
	pub fn materialize(
		&self,
		mut payload: Map<String, Value>,
	) -> Result<Map<String, Value>, PropertyError> {
		let snapshot = self.snapshot();

		for (name, value) in snapshot.iter() {
			let resolved = match value {
				PropertyValue::Static(value) => value.clone(),
				PropertyValue::Dynamic(provider) => resolve(name, provider.as_ref())?,
			};
			payload.insert(name.clone(), resolved);
		}

		Ok(payload)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.snapshot().contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.snapshot().len()
	}

	pub fn is_empty(&self) -> bool {
		self.snapshot().is_empty()
	}

	fn snapshot(&self) -> Arc<Entries> {
		Arc::clone(&self.entries.read().unwrap_or_else(PoisonError::into_inner))
	}
}

fn resolve(name: &str, provider: &dyn DynamicProperty) -> Result<Value, PropertyError> {
	match provider.value() {
		Ok(Value::Null) => Err(PropertyError::ProviderReturnedNull {
			name: name.to_string(),
		}),
		Ok(value) => Ok(value),
		Err(source) => Err(PropertyError::ProviderFailed {
			name: name.to_string(),
			source,
		}),
	}
}
