// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Response shape of the bulk insert endpoint.
//!
//! The service answers a bulk insert with one result per submitted event,
//! grouped by collection and in submission order:
//!
//! ```json
//! {"purchases": [{"success": true}, {"success": false, "error": {"name": "...", "description": "..."}}]}
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::service_error::ServiceError;

/// Per-collection results of a bulk insert.
pub type BulkResponse = HashMap<String, Vec<BulkInsertResult>>;

/// Outcome of one event in a bulk insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkInsertResult {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<BulkInsertError>,
}

/// Failure detail of one event in a bulk insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkInsertError {
	pub name: String,
	#[serde(default)]
	pub description: String,
}

impl From<BulkInsertError> for ServiceError {
	fn from(err: BulkInsertError) -> Self {
		ServiceError::new(err.name, err.description)
	}
}
