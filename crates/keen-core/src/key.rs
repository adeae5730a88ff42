// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Project API keys.
//!
//! A project has up to three keys:
//! - `Master`: full access, required for administrative calls
//! - `Write`: event submission
//! - `Read`: queries
//!
//! The master key can stand in for either of the others.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

const REDACTED: &str = "[REDACTED]";

/// The role a key plays against the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
	Master,
	Write,
	Read,
}

impl KeyKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			KeyKind::Master => "master",
			KeyKind::Write => "write",
			KeyKind::Read => "read",
		}
	}
}

impl fmt::Display for KeyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// An API key that never appears in logs or serialized output.
///
/// The value is zeroed when dropped and is only reachable through
/// [`ApiKey::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
	value: String,
}

impl ApiKey {
	pub fn new(value: impl Into<String>) -> Self {
		Self {
			value: value.into(),
		}
	}

	pub fn expose(&self) -> &str {
		&self.value
	}

	pub fn is_empty(&self) -> bool {
		self.value.trim().is_empty()
	}
}

impl Drop for ApiKey {
	fn drop(&mut self) {
		self.value.zeroize();
	}
}

impl fmt::Debug for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ApiKey").field(&REDACTED).finish()
	}
}

impl fmt::Display for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl Serialize for ApiKey {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for ApiKey {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(ApiKey::new)
	}
}

/// The set of keys configured for one project.
#[derive(Debug, Clone, Default)]
pub struct ProjectKeys {
	pub master: Option<ApiKey>,
	pub write: Option<ApiKey>,
	pub read: Option<ApiKey>,
}

impl ProjectKeys {
	/// Returns the key to use for the given role, falling back to the master
	/// key for write and read access.
	pub fn for_kind(&self, kind: KeyKind) -> Option<&ApiKey> {
		let specific = match kind {
			KeyKind::Master => None,
			KeyKind::Write => self.write.as_ref(),
			KeyKind::Read => self.read.as_ref(),
		};
		let usable = |key: &&ApiKey| !key.is_empty();
		specific
			.filter(usable)
			.or_else(|| self.master.as_ref().filter(usable))
	}

	/// Returns true if no usable key is configured.
	pub fn is_empty(&self) -> bool {
		[&self.master, &self.write, &self.read]
			.iter()
			.all(|key| key.as_ref().map_or(true, ApiKey::is_empty))
	}
}
