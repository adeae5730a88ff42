// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier rules enforced by the remote service.
//!
//! Collection names address where an event is stored; property names are
//! keys inside an event. Both are checked locally so malformed identifiers
//! fail before any request is made.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a collection name, in characters.
pub const MAX_COLLECTION_NAME_LENGTH: usize = 64;

/// Maximum length of a property name, in characters.
pub const MAX_PROPERTY_NAME_LENGTH: usize = 256;

/// Top-level property the service reserves for timestamps and add-ons.
pub const RESERVED_PROPERTY: &str = "keen";

/// A malformed identifier, event, or query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("invalid collection name '{name}': {reason}")]
	InvalidCollectionName { name: String, reason: &'static str },

	#[error("invalid property name '{name}': {reason}")]
	InvalidPropertyName { name: String, reason: &'static str },

	#[error("event must be a JSON object, got {found}")]
	EventNotObject { found: &'static str },

	#[error("invalid query: {0}")]
	InvalidQuery(String),
}

/// A validated collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
	/// Validates `name` and wraps it.
	pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
		let name = name.into();
		if let Some(reason) = collection_name_violation(&name) {
			return Err(ValidationError::InvalidCollectionName { name, reason });
		}
		Ok(Self(name))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

fn collection_name_violation(name: &str) -> Option<&'static str> {
	if name.trim().is_empty() {
		return Some("must not be blank");
	}
	if name.chars().count() > MAX_COLLECTION_NAME_LENGTH {
		return Some("must be at most 64 characters");
	}
	if !name.is_ascii() {
		return Some("must contain only ASCII characters");
	}
	if name.contains('$') {
		return Some("must not contain '$'");
	}
	if name.contains('.') {
		return Some("must not contain '.'");
	}
	if name.starts_with('_') {
		return Some("must not start with '_'");
	}
	None
}

impl std::fmt::Display for CollectionName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl std::str::FromStr for CollectionName {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl TryFrom<String> for CollectionName {
	type Error = ValidationError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl TryFrom<&str> for CollectionName {
	type Error = ValidationError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl From<CollectionName> for String {
	fn from(name: CollectionName) -> Self {
		name.0
	}
}

impl AsRef<str> for CollectionName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

/// Validates a top-level property name.
pub fn validate_property_name(name: &str) -> Result<(), ValidationError> {
	let reason = if name.is_empty() {
		Some("must not be empty")
	} else if name.chars().count() > MAX_PROPERTY_NAME_LENGTH {
		Some("must be at most 256 characters")
	} else if name.contains('.') {
		Some("must not contain '.'")
	} else if name.starts_with('$') {
		Some("must not start with '$'")
	} else if name.eq_ignore_ascii_case(RESERVED_PROPERTY) {
		Some("'keen' is reserved")
	} else {
		None
	};

	match reason {
		Some(reason) => Err(ValidationError::InvalidPropertyName {
			name: name.to_string(),
			reason,
		}),
		None => Ok(()),
	}
}
