// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process transport for unit tests.

use std::sync::Mutex;

use serde_json::json;

use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

type Responder =
	dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Answers every request with a closure and records what was sent.
pub(crate) struct MockTransport {
	responder: Box<Responder>,
	requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
	pub(crate) fn new<F>(responder: F) -> Self
	where
		F: Fn(&TransportRequest) -> Result<TransportResponse, TransportError>
			+ Send
			+ Sync
			+ 'static,
	{
		Self {
			responder: Box::new(responder),
			requests: Mutex::new(Vec::new()),
		}
	}

	/// Accepts every request with `201 {"created": true}`.
	pub(crate) fn accepting() -> Self {
		Self::new(|_| Ok(TransportResponse::new(201, json!({"created": true}))))
	}

	pub(crate) fn requests(&self) -> Vec<TransportRequest> {
		self.requests.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl Transport for MockTransport {
	async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
		let response = (self.responder)(&request);
		self.requests.lock().unwrap().push(request);
		response
	}
}
