// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of records to the service and draining of the event cache.

use std::collections::HashMap;

use keen_core::{ApiKey, BulkInsertResult, BulkResponse, ServiceError};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::cache::EventCache;
use crate::error::{DeliveryError, FailedEvents, KeenError, Result};
use crate::record::CachedEvent;
use crate::transport::{Method, Transport, TransportRequest, TransportResponse};

/// Interprets a response.
///
/// An `error_code` in the body is a failure whatever the status. Otherwise
/// a non-2xx status is a failure. Anything else is success.
pub(crate) fn classify(response: TransportResponse) -> std::result::Result<Value, DeliveryError> {
	if let Some(err) = ServiceError::inspect(&response.body) {
		return Err(DeliveryError::Service(err));
	}

	if !response.is_success() {
		return Err(DeliveryError::Status {
			status: response.status,
			message: describe(&response.body),
		});
	}

	Ok(response.body)
}

fn describe(body: &Value) -> String {
	match body {
		Value::Null => String::new(),
		Value::String(text) => text.clone(),
		other => other
			.get("message")
			.and_then(Value::as_str)
			.map(str::to_string)
			.unwrap_or_else(|| other.to_string()),
	}
}

/// Sends one request and classifies the outcome.
pub(crate) async fn send(
	transport: &dyn Transport,
	request: TransportRequest,
) -> std::result::Result<Value, DeliveryError> {
	let response = transport.send(request).await?;
	classify(response)
}

/// Delivers a single record.
pub(crate) async fn deliver(
	transport: &dyn Transport,
	event: &CachedEvent,
	key: &ApiKey,
) -> std::result::Result<(), DeliveryError> {
	let request = TransportRequest::new(Method::Post, key.clone())
		.segment("events")
		.segment(event.destination().as_str())
		.json(Value::Object(event.payload().clone()));

	send(transport, request).await.map(|_| ())
}

/// Drains `cache`, delivering every record in the order it is taken.
///
/// A failed delivery never stops the drain. Each failed record keeps its
/// error and is returned in [`KeenError::CacheSubmission`] once the cache
/// is empty. Every taken record leaves the cache whatever its outcome.
///
/// If the cache itself fails mid-drain, the failures collected so far are
/// reported together with the cache error; with none collected the cache
/// error is returned on its own.
pub(crate) async fn drain(
	transport: &dyn Transport,
	cache: &dyn EventCache,
	key: &ApiKey,
) -> Result<usize> {
	let mut delivered = 0usize;
	let mut failed = Vec::new();

	loop {
		let mut event = match cache.try_take().await {
			Ok(Some(event)) => event,
			Ok(None) => break,
			Err(err) => {
				error!(error = %err, delivered, failed = failed.len(), "Event cache failed during drain");
				if failed.is_empty() {
					return Err(err.into());
				}
				let failed = FailedEvents::new(failed).interrupted_by(err);
				return Err(KeenError::CacheSubmission(failed));
			}
		};

		match deliver(transport, &event, key).await {
			Ok(()) => {
				debug!(collection = %event.destination(), "Delivered cached event");
				delivered += 1;
			}
			Err(err) => {
				warn!(collection = %event.destination(), error = %err, "Cached event delivery failed");
				event.record_failure(err);
				failed.push(event);
			}
		}
	}

	info!(delivered, failed = failed.len(), "Drained event cache");

	if failed.is_empty() {
		Ok(delivered)
	} else {
		Err(KeenError::CacheSubmission(FailedEvents::new(failed)))
	}
}

/// Delivers `events` in one bulk request.
///
/// A failure of the request as a whole is a [`KeenError::Delivery`]. When the
/// request succeeds, each event is matched to its per-collection result in
/// submission order; rejected events are returned in
/// [`KeenError::BulkSubmission`].
pub(crate) async fn deliver_bulk(
	transport: &dyn Transport,
	events: Vec<CachedEvent>,
	key: &ApiKey,
) -> Result<()> {
	if events.is_empty() {
		return Ok(());
	}

	let mut body = Map::new();
	for event in &events {
		let slot = body
			.entry(event.destination().as_str())
			.or_insert_with(|| Value::Array(Vec::new()));
		if let Value::Array(list) = slot {
			list.push(Value::Object(event.payload().clone()));
		}
	}

	let request = TransportRequest::new(Method::Post, key.clone())
		.segment("events")
		.json(Value::Object(body));
	let response = send(transport, request).await?;

	let results: BulkResponse = serde_json::from_value(response)
		.map_err(|e| DeliveryError::MalformedResponse(format!("bulk insert response: {e}")))?;
	let mut results: HashMap<String, std::vec::IntoIter<BulkInsertResult>> = results
		.into_iter()
		.map(|(collection, list)| (collection, list.into_iter()))
		.collect();

	let total = events.len();
	let mut failed = Vec::new();
	for mut event in events {
		let outcome = results
			.get_mut(event.destination().as_str())
			.and_then(Iterator::next);

		let error = match outcome {
			Some(BulkInsertResult { success: true, .. }) => continue,
			Some(BulkInsertResult {
				error: Some(err), ..
			}) => DeliveryError::Service(err.into()),
			Some(_) => {
				DeliveryError::MalformedResponse("event rejected without an error".to_string())
			}
			None => DeliveryError::MalformedResponse("no result returned for event".to_string()),
		};

		warn!(collection = %event.destination(), error = %error, "Bulk event rejected");
		event.record_failure(error);
		failed.push(event);
	}

	info!(total, failed = failed.len(), "Bulk insert complete");

	if failed.is_empty() {
		Ok(())
	} else {
		Err(KeenError::BulkSubmission(FailedEvents::new(failed)))
	}
}
