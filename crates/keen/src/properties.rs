// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Helper for building event bodies.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// A builder for an event body.
///
/// Anything implementing `Serialize` into a JSON object can be submitted as
/// an event; `Properties` is the ad-hoc option.
///
/// # Example
///
/// ```
/// use keen::Properties;
///
/// let purchase = Properties::new()
///     .insert("item", "golden widget")
///     .insert("price", 25.5)
///     .insert("quantity", 2)
///     .insert("gift", false);
/// assert_eq!(purchase.len(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a property; a later insert of the same key replaces it.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Merges `other` into this one, `other` winning on conflicts.
	pub fn merge(mut self, other: Properties) -> Self {
		self.inner.extend(other.inner);
		self
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.inner
	}

	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

impl Serialize for Properties {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		self.inner.serialize(serializer)
	}
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		props.into_value()
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}
