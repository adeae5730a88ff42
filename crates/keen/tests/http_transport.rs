// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end tests against a mock Keen HTTP server.

use keen::{
	AddOn, DeliveryError, KeenClient, KeenClientBuilder, KeenError, Properties, Query, QueryType,
	RetryConfig, ServiceErrorKind, Timeframe,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "proj_1";

fn builder(server: &MockServer) -> KeenClientBuilder {
	KeenClient::builder()
		.project_id(PROJECT)
		.write_key("wk")
		.read_key("rk")
		.master_key("mk")
		.base_url(format!("{}/3.0", server.uri()))
		.retry_config(RetryConfig::none())
}

fn events_path(collection: &str) -> String {
	format!("/3.0/projects/{PROJECT}/events/{collection}")
}

async fn sent_bodies(server: &MockServer) -> Vec<Value> {
	server
		.received_requests()
		.await
		.unwrap_or_default()
		.iter()
		.map(|request| serde_json::from_slice(&request.body).unwrap())
		.collect()
}

#[tokio::test]
async fn direct_event_is_posted_with_write_key() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path(events_path("purchases")))
		.and(header("Authorization", "wk"))
		.and(body_json(json!({"item": "widget", "platform": "rust"})))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
		.expect(1)
		.mount(&server)
		.await;

	let client = builder(&server).build().unwrap();
	client.add_global_property("platform", "rust").unwrap();
	client
		.add_event("purchases", &Properties::new().insert("item", "widget"))
		.await
		.unwrap();
}

#[tokio::test]
async fn drain_empties_cache_and_reports_failures() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path(events_path("bad")))
		.respond_with(ResponseTemplate::new(400).set_body_json(json!({
			"error_code": "InvalidPropertyNameError",
			"message": "Property name cannot contain '.'"
		})))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(events_path("good")))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
		.mount(&server)
		.await;

	let client = builder(&server).memory_cache().build().unwrap();
	client.add_event("bad", &json!({"n": 1})).await.unwrap();
	client.add_event("good", &json!({"n": 2})).await.unwrap();
	client.add_event("good", &json!({"n": 3})).await.unwrap();

	let err = client.submit_cached().await.unwrap_err();

	let failed = err.failed_events().unwrap();
	assert_eq!(failed.len(), 1);
	assert_eq!(failed[0].destination().as_str(), "bad");
	assert_eq!(failed[0].payload()["n"], 1);
	assert_eq!(
		failed[0].error().and_then(DeliveryError::service_kind),
		Some(ServiceErrorKind::InvalidPropertyName)
	);
	assert_eq!(client.cached_len().await.unwrap(), 0);

	let sent: Vec<_> = sent_bodies(&server).await.iter().map(|b| b["n"].clone()).collect();
	assert_eq!(sent, vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn error_code_in_success_response_is_a_failure() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"error_code": "InvalidEventError",
			"message": "rejected"
		})))
		.mount(&server)
		.await;

	let client = builder(&server).build().unwrap();
	let err = client.add_event("clicks", &json!({})).await.unwrap_err();

	match err {
		KeenError::Delivery(DeliveryError::Service(service)) => {
			assert_eq!(service.code, "InvalidEventError");
			assert_eq!(service.message, "rejected");
		}
		other => panic!("unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn non_json_error_body_keeps_its_text() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
		.mount(&server)
		.await;

	let client = builder(&server).build().unwrap();
	let err = client.add_event("clicks", &json!({})).await.unwrap_err();

	match err {
		KeenError::Delivery(DeliveryError::Status { status, message }) => {
			assert_eq!(status, 502);
			assert_eq!(message, "Bad Gateway");
		}
		other => panic!("unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn unreachable_server_fails_each_cached_event() {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let base = format!("http://{}/3.0", listener.local_addr().unwrap());
	drop(listener);

	let client = KeenClient::builder()
		.project_id(PROJECT)
		.write_key("wk")
		.base_url(base)
		.retry_config(RetryConfig::none())
		.memory_cache()
		.build()
		.unwrap();
	client.add_event("a", &json!({})).await.unwrap();
	client.add_event("b", &json!({})).await.unwrap();

	let err = client.submit_cached().await.unwrap_err();

	let failed = err.failed_events().unwrap();
	assert_eq!(failed.len(), 2);
	assert!(failed
		.iter()
		.all(|event| matches!(event.error(), Some(DeliveryError::Transport(_)))));
	assert_eq!(client.cached_len().await.unwrap(), 0);
}

#[tokio::test]
async fn bulk_insert_reports_rejected_events() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path(format!("/3.0/projects/{PROJECT}/events")))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"signups": [
				{"success": true},
				{"success": false, "error": {"name": "InvalidPropertyNameError", "description": "bad"}}
			]
		})))
		.expect(1)
		.mount(&server)
		.await;

	let client = builder(&server).build().unwrap();
	let err = client
		.add_events(vec![
			("signups", json!({"plan": "free"})),
			("signups", json!({"plan": "pro"})),
		])
		.await
		.unwrap_err();

	assert!(matches!(err, KeenError::BulkSubmission(_)));
	let failed = err.failed_events().unwrap();
	assert_eq!(failed.len(), 1);
	assert_eq!(failed[0].payload()["plan"], "pro");

	let body = &sent_bodies(&server).await[0];
	assert_eq!(body["signups"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn addons_are_sent_under_keen() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path(events_path("visits")))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
		.mount(&server)
		.await;

	let client = builder(&server).build().unwrap();
	client
		.add_event_with_addons(
			"visits",
			&json!({"ua": "Mozilla/5.0"}),
			&[AddOn::user_agent_parser("ua", "parsed_ua")],
		)
		.await
		.unwrap();

	let body = &sent_bodies(&server).await[0];
	assert_eq!(body["keen"]["addons"][0]["name"], "keen:ua_parser");
	assert_eq!(body["keen"]["addons"][0]["input"]["ua_string"], "ua");
}

#[tokio::test]
async fn admin_calls_use_master_key() {
	let server = MockServer::start().await;
	Mock::given(method("DELETE"))
		.and(path(events_path("old")))
		.and(header("Authorization", "mk"))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path(events_path("purchases")))
		.and(header("Authorization", "mk"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(json!({"properties": {"price": "num"}})),
		)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path(format!("/3.0/projects/{PROJECT}/events")))
		.and(header("Authorization", "mk"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "purchases"}])))
		.mount(&server)
		.await;

	let client = builder(&server).build().unwrap();
	client.delete_collection("old").await.unwrap();

	let schema = client.get_schema("purchases").await.unwrap();
	assert_eq!(schema["properties"]["price"], "num");

	let schemas = client.get_schemas().await.unwrap();
	assert_eq!(schemas[0]["name"], "purchases");
}

#[tokio::test]
async fn missing_collection_surfaces_service_error() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(404).set_body_json(json!({
			"error_code": "ResourceNotFoundError",
			"message": "Resource not found"
		})))
		.mount(&server)
		.await;

	let client = builder(&server).build().unwrap();
	let err = client.get_schema("missing").await.unwrap_err();

	match err {
		KeenError::Delivery(delivery) => {
			assert_eq!(delivery.service_kind(), Some(ServiceErrorKind::ResourceNotFound))
		}
		other => panic!("unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn query_sends_parameters_and_returns_result() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(format!("/3.0/projects/{PROJECT}/queries/sum")))
		.and(header("Authorization", "rk"))
		.and(query_param("event_collection", "purchases"))
		.and(query_param("target_property", "price"))
		.and(query_param("timeframe", "this_7_days"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 125.5})))
		.expect(1)
		.mount(&server)
		.await;

	let client = builder(&server).build().unwrap();
	let result = client
		.query(
			&Query::new(QueryType::Sum, "purchases")
				.target_property("price")
				.timeframe(Timeframe::relative("this_7_days")),
		)
		.await
		.unwrap();

	assert_eq!(result, json!(125.5));
}

#[test]
fn blocking_client_round_trip() {
	let runtime = tokio::runtime::Runtime::new().unwrap();
	let server = runtime.block_on(async {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
			.expect(2)
			.mount(&server)
			.await;
		server
	});

	let client = builder(&server).memory_cache().build_blocking().unwrap();
	client.add_event("signups", &json!({"plan": "pro"})).unwrap();
	client.add_event("signups", &json!({"plan": "free"})).unwrap();
	assert_eq!(client.cached_len().unwrap(), 2);

	client.submit_cached().unwrap();
	assert_eq!(client.cached_len().unwrap(), 0);

	drop(client);
	runtime.block_on(async move { server.verify().await });
}
