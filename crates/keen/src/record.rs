// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cached event records and their construction.

use chrono::{DateTime, Utc};
use keen_core::{CollectionName, ValidationError, RESERVED_PROPERTY};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{DeliveryError, Result};
use crate::global::GlobalProperties;

/// A fully materialized event awaiting submission.
///
/// Destination and payload are fixed at creation. The error is only set by
/// the submission pipeline, at most once, after a failed delivery.
#[derive(Debug)]
pub struct CachedEvent {
	destination: CollectionName,
	payload: Map<String, Value>,
	created_at: DateTime<Utc>,
	error: Option<DeliveryError>,
}

impl CachedEvent {
	/// Wraps an already materialized payload.
	///
	/// Event caches that persist records use this to rebuild them.
	pub fn new(destination: CollectionName, payload: Map<String, Value>) -> Self {
		Self {
			destination,
			payload,
			created_at: Utc::now(),
			error: None,
		}
	}

	pub fn destination(&self) -> &CollectionName {
		&self.destination
	}

	pub fn payload(&self) -> &Map<String, Value> {
		&self.payload
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	pub fn error(&self) -> Option<&DeliveryError> {
		self.error.as_ref()
	}

	pub fn into_parts(self) -> (CollectionName, Map<String, Value>, Option<DeliveryError>) {
		(self.destination, self.payload, self.error)
	}

	pub(crate) fn record_failure(&mut self, error: DeliveryError) {
		if self.error.is_none() {
			self.error = Some(error);
		}
	}
}

/// A server-side enrichment requested through the reserved `keen` property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddOn {
	pub name: String,
	pub input: Map<String, Value>,
	pub output: String,
}

impl AddOn {
	pub fn new(name: impl Into<String>, input: Map<String, Value>, output: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			input,
			output: output.into(),
		}
	}

	/// Geolocates the IP address found in `ip_property`.
	pub fn ip_to_geo(ip_property: impl Into<String>, output: impl Into<String>) -> Self {
		Self::single_input("keen:ip_to_geo", "ip", ip_property, output)
	}

	/// Parses the user agent string found in `ua_property`.
	pub fn user_agent_parser(ua_property: impl Into<String>, output: impl Into<String>) -> Self {
		Self::single_input("keen:ua_parser", "ua_string", ua_property, output)
	}

	/// Splits the URL found in `url_property` into its components.
	pub fn url_parser(url_property: impl Into<String>, output: impl Into<String>) -> Self {
		Self::single_input("keen:url_parser", "url", url_property, output)
	}

	fn single_input(
		name: &str,
		input_key: &str,
		property: impl Into<String>,
		output: impl Into<String>,
	) -> Self {
		let mut input = Map::new();
		input.insert(input_key.to_string(), Value::String(property.into()));
		Self::new(name, input, output)
	}
}

/// Builds a record: validates the destination, converts the event into a
/// JSON object, attaches add-ons, then merges global properties.
pub(crate) fn build_event<T>(
	collection: &str,
	event: &T,
	addons: &[AddOn],
	globals: &GlobalProperties,
) -> Result<CachedEvent>
where
	T: Serialize + ?Sized,
{
	let destination = CollectionName::new(collection)?;
	let mut body = into_object(serde_json::to_value(event)?)?;

	if !addons.is_empty() {
		attach_addons(&mut body, addons)?;
	}

	let payload = globals.materialize(body)?;
	Ok(CachedEvent::new(destination, payload))
}

fn into_object(value: Value) -> std::result::Result<Map<String, Value>, ValidationError> {
	let found = match value {
		Value::Object(map) => return Ok(map),
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
	};
	Err(ValidationError::EventNotObject { found })
}

fn attach_addons(body: &mut Map<String, Value>, addons: &[AddOn]) -> Result<()> {
	let keen = body
		.entry(RESERVED_PROPERTY)
		.or_insert_with(|| Value::Object(Map::new()));

	let Value::Object(keen) = keen else {
		return Err(ValidationError::InvalidPropertyName {
			name: RESERVED_PROPERTY.to_string(),
			reason: "must be an object when add-ons are used",
		}
		.into());
	};

	keen.insert("addons".to_string(), serde_json::to_value(addons)?);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{KeenError, PropertyError};
	use crate::global::PropertyValue;
	use crate::properties::Properties;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	#[test]
	fn builds_record_with_globals_merged() {
		let globals = GlobalProperties::new();
		globals.register("platform", json!("cli").into()).unwrap();

		let event = Properties::new().insert("item", "widget");
		let record = build_event("purchases", &event, &[], &globals).unwrap();

		assert_eq!(record.destination().as_str(), "purchases");
		assert_eq!(record.payload()["item"], "widget");
		assert_eq!(record.payload()["platform"], "cli");
		assert!(record.error().is_none());
	}

	#[test]
	fn invalid_destination_is_rejected() {
		let globals = GlobalProperties::new();
		let err = build_event("$purchases", &json!({}), &[], &globals).unwrap_err();
		assert!(matches!(err, KeenError::Validation(_)));
	}

	#[test]
	fn non_object_events_are_rejected() {
		let globals = GlobalProperties::new();
		for event in [json!(null), json!(3), json!("text"), json!([1])] {
			let err = build_event("purchases", &event, &[], &globals).unwrap_err();
			assert!(matches!(
				err,
				KeenError::Validation(ValidationError::EventNotObject { .. })
			));
		}
	}

	#[test]
	fn serializable_structs_become_payloads() {
		#[derive(Serialize)]
		struct Signup {
			plan: &'static str,
			seats: u32,
		}

		let globals = GlobalProperties::new();
		let record = build_event(
			"signups",
			&Signup {
				plan: "pro",
				seats: 5,
			},
			&[],
			&globals,
		)
		.unwrap();

		assert_eq!(record.payload()["plan"], "pro");
		assert_eq!(record.payload()["seats"], 5);
	}

	#[test]
	fn addons_are_placed_under_keen() {
		let globals = GlobalProperties::new();
		let event = json!({"ip": "8.8.8.8", "keen": {"timestamp": "2024-01-01T00:00:00Z"}});
		let record = build_event(
			"visits",
			&event,
			&[AddOn::ip_to_geo("ip", "geo")],
			&globals,
		)
		.unwrap();

		let keen = &record.payload()["keen"];
		assert_eq!(keen["timestamp"], "2024-01-01T00:00:00Z");
		assert_eq!(keen["addons"][0]["name"], "keen:ip_to_geo");
		assert_eq!(keen["addons"][0]["input"]["ip"], "ip");
		assert_eq!(keen["addons"][0]["output"], "geo");
	}

	#[test]
	fn addons_require_object_keen_property() {
		let globals = GlobalProperties::new();
		let err = build_event(
			"visits",
			&json!({"keen": 1}),
			&[AddOn::url_parser("url", "parsed")],
			&globals,
		)
		.unwrap_err();
		assert!(matches!(err, KeenError::Validation(_)));
	}

	#[test]
	fn registry_changes_do_not_touch_existing_records() {
		let globals = GlobalProperties::new();
		let record = build_event("clicks", &json!({"x": 1}), &[], &globals).unwrap();

		globals.register("late", json!("value").into()).unwrap();

		assert!(!record.payload().contains_key("late"));
	}

	#[test]
	fn provider_failure_fails_only_that_event() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let globals = GlobalProperties::new();
		globals
			.register(
				"ticket",
				PropertyValue::dynamic(move || -> std::result::Result<Value, std::io::Error> {
					match counter.fetch_add(1, Ordering::SeqCst) {
						0 | 1 => Ok(json!("ok")),
						_ => Ok(Value::Null),
					}
				}),
			)
			.unwrap();

		let first = build_event("tickets", &json!({}), &[], &globals).unwrap();
		let second = build_event("tickets", &json!({}), &[], &globals).unwrap_err();

		assert_eq!(first.payload()["ticket"], "ok");
		assert!(matches!(
			second,
			KeenError::Property(PropertyError::ProviderReturnedNull { .. })
		));
	}

	#[test]
	fn failure_is_recorded_once() {
		let mut record = CachedEvent::new(CollectionName::new("c").unwrap(), Map::new());
		record.record_failure(DeliveryError::Status {
			status: 400,
			message: "first".to_string(),
		});
		record.record_failure(DeliveryError::Status {
			status: 500,
			message: "second".to_string(),
		});

		assert_eq!(record.error().and_then(DeliveryError::status), Some(400));
	}
}
