// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: cache events locally, then submit them in one drain.
//!
//! Run with:
//!   KEEN_PROJECT_ID=... KEEN_WRITE_KEY=... cargo run --example submit_cached -p keen

use keen::{KeenClient, KeenError, ProjectSettings, Properties};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keen=debug,info")),
		)
		.init();

	let settings = ProjectSettings::from_env()?;
	println!("Project: {}", settings.project_id);
	println!("Base URL: {}", settings.base_url);

	let client = KeenClient::builder()
		.settings(settings)
		.memory_cache()
		.build()?;

	client.add_global_property("sdk", "keen-rust")?;
	client.add_dynamic_property("sent_at", || -> Result<Value, std::io::Error> {
		Ok(chrono::Utc::now().to_rfc3339().into())
	})?;

	for (item, price) in [("golden widget", 25.5), ("silver widget", 12.0), ("tin widget", 1.25)] {
		client
			.add_event(
				"purchases",
				&Properties::new().insert("item", item).insert("price", price),
			)
			.await?;
	}
	println!("Cached {} events", client.cached_len().await?);

	match client.submit_cached().await {
		Ok(()) => println!("All events submitted"),
		Err(KeenError::CacheSubmission(failed)) => {
			println!("{} event(s) failed:", failed.len());
			for event in failed.events() {
				if let Some(err) = event.error() {
					println!("  {}: {}", event.destination(), err);
				}
			}
		}
		Err(e) => return Err(e.into()),
	}

	Ok(())
}
