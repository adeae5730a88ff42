// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Service-level errors embedded in response bodies.
//!
//! The service can report a failure inside the JSON body independently of
//! the HTTP status, e.g.:
//!
//! ```json
//! {"error_code": "InvalidCollectionNameError", "message": "..."}
//! ```

use serde_json::Value;

/// Known error codes reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
	InvalidApiKey,
	ResourceNotFound,
	InvalidEvent,
	InvalidCollectionName,
	InvalidPropertyName,
	ListsOfNonPrimitivesNotAllowed,
	InvalidBatch,
	InternalServer,
	Other,
}

impl ServiceErrorKind {
	/// Maps a raw `error_code` to its kind.
	pub fn from_code(code: &str) -> Self {
		match code {
			"InvalidApiKeyError" => Self::InvalidApiKey,
			"ResourceNotFoundError" => Self::ResourceNotFound,
			"InvalidEventError" => Self::InvalidEvent,
			"InvalidCollectionNameError" => Self::InvalidCollectionName,
			"InvalidPropertyNameError" => Self::InvalidPropertyName,
			"ListsOfNonPrimitivesNotAllowedError" => Self::ListsOfNonPrimitivesNotAllowed,
			"InvalidBatchError" => Self::InvalidBatch,
			"InternalServerError" => Self::InternalServer,
			_ => Self::Other,
		}
	}
}

/// A service-reported failure: the raw code and its human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
	pub code: String,
	pub message: String,
}

impl ServiceError {
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			code: code.into(),
			message: message.into(),
		}
	}

	/// Extracts the embedded error from a response body, if one is present.
	///
	/// Only a string `error_code` counts; `message` defaults to empty.
	pub fn inspect(body: &Value) -> Option<Self> {
		let code = body.get("error_code")?.as_str()?;
		let message = body
			.get("message")
			.and_then(Value::as_str)
			.unwrap_or_default();
		Some(Self::new(code, message))
	}

	pub fn kind(&self) -> ServiceErrorKind {
		ServiceErrorKind::from_code(&self.code)
	}
}

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.message.is_empty() {
			f.write_str(&self.code)
		} else {
			write!(f, "{}: {}", self.code, self.message)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn inspect_extracts_code_and_message() {
		let body = json!({"error_code": "InvalidEventError", "message": "bad event"});
		let err = ServiceError::inspect(&body).unwrap();

		assert_eq!(err.code, "InvalidEventError");
		assert_eq!(err.message, "bad event");
		assert_eq!(err.kind(), ServiceErrorKind::InvalidEvent);
	}

	#[test]
	fn inspect_ignores_bodies_without_error_code() {
		assert!(ServiceError::inspect(&json!({"created": true})).is_none());
		assert!(ServiceError::inspect(&json!({"message": "ok"})).is_none());
		assert!(ServiceError::inspect(&json!([1, 2, 3])).is_none());
		assert!(ServiceError::inspect(&json!({"error_code": 42})).is_none());
	}

	#[test]
	fn missing_message_defaults_to_empty() {
		let err = ServiceError::inspect(&json!({"error_code": "InternalServerError"})).unwrap();
		assert_eq!(err.message, "");
		assert_eq!(err.to_string(), "InternalServerError");
	}

	#[test]
	fn unknown_codes_map_to_other() {
		assert_eq!(
			ServiceErrorKind::from_code("SomethingNewError"),
			ServiceErrorKind::Other
		);
	}
}
