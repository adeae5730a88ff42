// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The request/response boundary between the client and the service.

use keen_common_http::{RetryConfig, RetryableError};
use keen_core::ApiKey;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::client::ClientConfig;
use crate::error::{KeenError, Result};

/// HTTP methods used by the service API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Get,
	Post,
	Delete,
}

impl Method {
	fn as_reqwest(self) -> reqwest::Method {
		match self {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
			Method::Delete => reqwest::Method::DELETE,
		}
	}
}

/// A request against one project.
///
/// `path` is relative to the project, e.g. `["events", "purchases"]`.
#[derive(Debug, Clone)]
pub struct TransportRequest {
	pub method: Method,
	pub path: Vec<String>,
	pub key: ApiKey,
	pub query: Vec<(String, String)>,
	pub body: Option<Value>,
}

impl TransportRequest {
	pub fn new(method: Method, key: ApiKey) -> Self {
		Self {
			method,
			path: Vec::new(),
			key,
			query: Vec::new(),
			body: None,
		}
	}

	pub fn segment(mut self, segment: impl Into<String>) -> Self {
		self.path.push(segment.into());
		self
	}

	pub fn query(mut self, params: Vec<(String, String)>) -> Self {
		self.query.extend(params);
		self
	}

	pub fn json(mut self, body: Value) -> Self {
		self.body = Some(body);
		self
	}

	/// The project-relative path joined with `/`.
	pub fn path_string(&self) -> String {
		self.path.join("/")
	}
}

/// The status and JSON body of a response.
///
/// An empty body is `Value::Null`. A body that is not JSON is wrapped as
/// `{"message": <text>}`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
	pub status: u16,
	pub body: Value,
}

impl TransportResponse {
	pub fn new(status: u16, body: Value) -> Self {
		Self { status, body }
	}

	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// A request that produced no response.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("request failed: {0}")]
	Request(#[from] reqwest::Error),

	/// Raised by custom transports that cannot reach the service.
	#[error("transport unavailable: {0}")]
	Unavailable(String),
}

impl RetryableError for TransportError {
	fn is_retryable(&self) -> bool {
		match self {
			TransportError::Request(err) => err.is_retryable(),
			TransportError::Unavailable(_) => false,
		}
	}
}

/// Sends requests to the service.
///
/// Implementations own timeouts and retries. They report every response
/// they receive, successful or not, and fail only when no response exists.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	async fn send(&self, request: TransportRequest)
		-> std::result::Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport for the Keen REST API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	base_url: Url,
	project_id: String,
	client: Client,
	retry_config: RetryConfig,
}

impl HttpTransport {
	/// Creates a transport rooted at `base_url`, e.g. `https://api.keen.io/3.0`.
	pub fn new(base_url: &str, project_id: impl Into<String>, config: &ClientConfig) -> Result<Self> {
		let base_url = parse_base_url(base_url)?;
		let client = keen_common_http::new_client_with_timeout(config.request_timeout)
			.map_err(KeenError::HttpClient)?;

		Ok(Self {
			base_url,
			project_id: project_id.into(),
			client,
			retry_config: config.retry_config.clone(),
		})
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn url_for(&self, request: &TransportRequest) -> Url {
		let mut url = self.base_url.clone();
		if let Ok(mut segments) = url.path_segments_mut() {
			segments
				.pop_if_empty()
				.push("projects")
				.push(&self.project_id)
				.extend(&request.path);
		}
		if !request.query.is_empty() {
			url.query_pairs_mut().extend_pairs(&request.query);
		}
		url
	}
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
	async fn send(
		&self,
		request: TransportRequest,
	) -> std::result::Result<TransportResponse, TransportError> {
		let url = self.url_for(&request);
		debug!(method = ?request.method, path = %url.path(), "Sending Keen request");

		let response = keen_common_http::retry(&self.retry_config, || async {
			let mut builder = self
				.client
				.request(request.method.as_reqwest(), url.clone())
				.header(AUTHORIZATION, request.key.expose());
			if let Some(body) = &request.body {
				builder = builder.json(body);
			}
			builder.send().await
		})
		.await?;

		let status = response.status().as_u16();
		let text = response.text().await?;
		debug!(status, bytes = text.len(), "Received Keen response");

		Ok(TransportResponse::new(status, parse_body(&text)))
	}
}

fn parse_base_url(raw: &str) -> Result<Url> {
	let url = Url::parse(raw).map_err(|e| KeenError::InvalidBaseUrl(format!("{raw}: {e}")))?;
	if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
		return Err(KeenError::InvalidBaseUrl(format!(
			"{raw}: expected an http or https URL"
		)));
	}
	Ok(url)
}

fn parse_body(text: &str) -> Value {
	if text.trim().is_empty() {
		return Value::Null;
	}
	serde_json::from_str(text).unwrap_or_else(|_| json!({ "message": text }))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn transport(base: &str) -> HttpTransport {
		HttpTransport::new(base, "proj_1", &ClientConfig::default()).unwrap()
	}

	#[test]
	fn builds_project_scoped_urls() {
		let transport = transport("https://api.keen.io/3.0");
		let request = TransportRequest::new(Method::Post, ApiKey::new("wk"))
			.segment("events")
			.segment("purchases");

		assert_eq!(
			transport.url_for(&request).as_str(),
			"https://api.keen.io/3.0/projects/proj_1/events/purchases"
		);
	}

	#[test]
	fn trailing_slash_in_base_is_ignored() {
		let transport = transport("http://localhost:8080/3.0/");
		let request = TransportRequest::new(Method::Get, ApiKey::new("mk")).segment("events");

		assert_eq!(
			transport.url_for(&request).as_str(),
			"http://localhost:8080/3.0/projects/proj_1/events"
		);
	}

	#[test]
	fn segments_and_query_are_encoded() {
		let transport = transport("https://api.keen.io/3.0");
		let request = TransportRequest::new(Method::Get, ApiKey::new("rk"))
			.segment("queries")
			.segment("count")
			.query(vec![("event_collection".to_string(), "page views".to_string())]);

		let url = transport.url_for(&request);
		assert_eq!(url.path(), "/3.0/projects/proj_1/queries/count");
		assert_eq!(url.query(), Some("event_collection=page+views"));
	}

	#[test]
	fn key_is_not_part_of_url() {
		let transport = transport("https://api.keen.io/3.0");
		let request = TransportRequest::new(Method::Get, ApiKey::new("secret_key")).segment("events");
		assert!(!transport.url_for(&request).as_str().contains("secret_key"));
	}

	#[test]
	fn invalid_base_urls_are_rejected() {
		for base in ["not a url", "mailto:someone@example.com", "ftp://example.com/3.0"] {
			let err = HttpTransport::new(base, "p", &ClientConfig::default()).unwrap_err();
			assert!(matches!(err, KeenError::InvalidBaseUrl(_)), "{base}");
		}
	}

	#[test]
	fn body_parsing() {
		assert_eq!(parse_body(""), Value::Null);
		assert_eq!(parse_body("{\"created\":true}"), json!({"created": true}));
		assert_eq!(
			parse_body("Bad Gateway"),
			json!({"message": "Bad Gateway"})
		);
	}

	#[test]
	fn success_range() {
		assert!(TransportResponse::new(201, Value::Null).is_success());
		assert!(!TransportResponse::new(302, Value::Null).is_success());
		assert!(!TransportResponse::new(500, Value::Null).is_success());
	}

	#[test]
	fn unavailable_is_not_retried() {
		assert!(!TransportError::Unavailable("offline".to_string()).is_retryable());
	}
}
