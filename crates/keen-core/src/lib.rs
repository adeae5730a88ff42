// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Keen analytics SDK.
//!
//! Nothing in this crate performs I/O. It holds the identifier rules the
//! remote service enforces, the API key wrapper, the shape of service-level
//! errors embedded in response bodies, bulk insert results, and query
//! parameters.

pub mod bulk;
pub mod key;
pub mod query;
pub mod service_error;
pub mod validation;

pub use bulk::{BulkInsertError, BulkInsertResult, BulkResponse};
pub use key::{ApiKey, KeyKind, ProjectKeys};
pub use query::{Filter, FilterOperator, Query, QueryType, Timeframe};
pub use service_error::{ServiceError, ServiceErrorKind};
pub use validation::{
	validate_property_name, CollectionName, ValidationError, MAX_COLLECTION_NAME_LENGTH,
	MAX_PROPERTY_NAME_LENGTH, RESERVED_PROPERTY,
};
