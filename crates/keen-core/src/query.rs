// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Analysis query parameters.
//!
//! A [`Query`] describes one analysis request and renders itself as the
//! URL query pairs the service expects. Execution happens in the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::{CollectionName, ValidationError};

/// The analysis to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
	Count,
	CountUnique,
	Minimum,
	Maximum,
	Average,
	Sum,
	Median,
	Percentile,
	SelectUnique,
	Extraction,
}

impl QueryType {
	/// Path segment of the analysis endpoint.
	pub fn as_str(&self) -> &'static str {
		match self {
			QueryType::Count => "count",
			QueryType::CountUnique => "count_unique",
			QueryType::Minimum => "minimum",
			QueryType::Maximum => "maximum",
			QueryType::Average => "average",
			QueryType::Sum => "sum",
			QueryType::Median => "median",
			QueryType::Percentile => "percentile",
			QueryType::SelectUnique => "select_unique",
			QueryType::Extraction => "extraction",
		}
	}

	/// Whether the analysis operates on a single property.
	pub fn requires_target_property(&self) -> bool {
		!matches!(self, QueryType::Count | QueryType::Extraction)
	}
}

impl std::fmt::Display for QueryType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The window of events a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timeframe {
	/// A relative window such as `this_7_days` or `previous_2_weeks`.
	Relative(String),
	Absolute {
		start: DateTime<Utc>,
		end: DateTime<Utc>,
	},
}

impl Timeframe {
	pub fn relative(window: impl Into<String>) -> Self {
		Timeframe::Relative(window.into())
	}

	fn to_param(&self) -> Result<String, ValidationError> {
		match self {
			Timeframe::Relative(window) if window.trim().is_empty() => Err(
				ValidationError::InvalidQuery("relative timeframe must not be empty".to_string()),
			),
			Timeframe::Relative(window) => Ok(window.clone()),
			Timeframe::Absolute { start, end } if start >= end => Err(
				ValidationError::InvalidQuery("timeframe start must precede its end".to_string()),
			),
			Timeframe::Absolute { start, end } => Ok(serde_json::json!({
				"start": start.to_rfc3339(),
				"end": end.to_rfc3339(),
			})
			.to_string()),
		}
	}
}

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
	#[serde(rename = "eq")]
	Equal,
	#[serde(rename = "ne")]
	NotEqual,
	#[serde(rename = "lt")]
	LessThan,
	#[serde(rename = "lte")]
	LessThanOrEqual,
	#[serde(rename = "gt")]
	GreaterThan,
	#[serde(rename = "gte")]
	GreaterThanOrEqual,
	#[serde(rename = "exists")]
	Exists,
	#[serde(rename = "in")]
	In,
	#[serde(rename = "contains")]
	Contains,
	#[serde(rename = "not_contains")]
	NotContains,
}

/// Restricts the events a query considers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
	pub property_name: String,
	pub operator: FilterOperator,
	pub property_value: Value,
}

impl Filter {
	pub fn new(
		property_name: impl Into<String>,
		operator: FilterOperator,
		property_value: impl Into<Value>,
	) -> Self {
		Self {
			property_name: property_name.into(),
			operator,
			property_value: property_value.into(),
		}
	}
}

/// An analysis request against one collection.
///
/// # Example
///
/// ```
/// use keen_core::{Filter, FilterOperator, Query, QueryType, Timeframe};
///
/// let query = Query::new(QueryType::Sum, "purchases")
///     .target_property("price")
///     .timeframe(Timeframe::relative("this_7_days"))
///     .interval("daily")
///     .filter(Filter::new("country", FilterOperator::Equal, "NZ"));
///
/// let params = query.to_params().unwrap();
/// assert!(params.iter().any(|(k, v)| k == "target_property" && v == "price"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
	pub analysis: QueryType,
	pub collection: String,
	pub target_property: Option<String>,
	pub timeframe: Option<Timeframe>,
	pub interval: Option<String>,
	pub timezone: Option<String>,
	pub group_by: Vec<String>,
	pub filters: Vec<Filter>,
	pub percentile: Option<f64>,
	pub latest: Option<u32>,
}

impl Query {
	pub fn new(analysis: QueryType, collection: impl Into<String>) -> Self {
		Self {
			analysis,
			collection: collection.into(),
			target_property: None,
			timeframe: None,
			interval: None,
			timezone: None,
			group_by: Vec::new(),
			filters: Vec::new(),
			percentile: None,
			latest: None,
		}
	}

	pub fn target_property(mut self, property: impl Into<String>) -> Self {
		self.target_property = Some(property.into());
		self
	}

	pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
		self.timeframe = Some(timeframe);
		self
	}

	pub fn interval(mut self, interval: impl Into<String>) -> Self {
		self.interval = Some(interval.into());
		self
	}

	pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
		self.timezone = Some(timezone.into());
		self
	}

	pub fn group_by(mut self, property: impl Into<String>) -> Self {
		self.group_by.push(property.into());
		self
	}

	pub fn filter(mut self, filter: Filter) -> Self {
		self.filters.push(filter);
		self
	}

	/// Percentile to compute, in `(0, 100]`. Only used by percentile queries.
	pub fn percentile(mut self, percentile: f64) -> Self {
		self.percentile = Some(percentile);
		self
	}

	/// Limits an extraction to the most recent `latest` events.
	pub fn latest(mut self, latest: u32) -> Self {
		self.latest = Some(latest);
		self
	}

	/// Validates the query and renders its URL parameters.
	pub fn to_params(&self) -> Result<Vec<(String, String)>, ValidationError> {
		let collection = CollectionName::new(self.collection.as_str())?;
		let mut params = vec![("event_collection".to_string(), collection.to_string())];

		match (&self.target_property, self.analysis.requires_target_property()) {
			(Some(property), _) => params.push(("target_property".to_string(), property.clone())),
			(None, true) => {
				return Err(ValidationError::InvalidQuery(format!(
					"{} requires a target property",
					self.analysis
				)))
			}
			(None, false) => {}
		}

		if self.analysis == QueryType::Percentile {
			match self.percentile {
				Some(p) if p > 0.0 && p <= 100.0 => {
					params.push(("percentile".to_string(), p.to_string()))
				}
				_ => {
					return Err(ValidationError::InvalidQuery(
						"percentile must be within (0, 100]".to_string(),
					))
				}
			}
		}

		if let Some(timeframe) = &self.timeframe {
			params.push(("timeframe".to_string(), timeframe.to_param()?));
		}
		if let Some(interval) = &self.interval {
			params.push(("interval".to_string(), interval.clone()));
		}
		if let Some(timezone) = &self.timezone {
			params.push(("timezone".to_string(), timezone.clone()));
		}

		match self.group_by.as_slice() {
			[] => {}
			[single] => params.push(("group_by".to_string(), single.clone())),
			many => params.push((
				"group_by".to_string(),
				Value::from(many.to_vec()).to_string(),
			)),
		}

		if !self.filters.is_empty() {
			let filters = serde_json::to_string(&self.filters)
				.map_err(|e| ValidationError::InvalidQuery(format!("unserializable filter: {e}")))?;
			params.push(("filters".to_string(), filters));
		}

		if let Some(latest) = self.latest {
			params.push(("latest".to_string(), latest.to_string()));
		}

		Ok(params)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
		params
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	#[test]
	fn count_needs_only_a_collection() {
		let params = Query::new(QueryType::Count, "signups").to_params().unwrap();
		assert_eq!(params, vec![("event_collection".to_string(), "signups".to_string())]);
	}

	#[test]
	fn sum_without_target_property_is_rejected() {
		let err = Query::new(QueryType::Sum, "purchases").to_params().unwrap_err();
		assert!(matches!(err, ValidationError::InvalidQuery(_)));
	}

	#[test]
	fn invalid_collection_is_rejected() {
		let err = Query::new(QueryType::Count, "$bad").to_params().unwrap_err();
		assert!(matches!(err, ValidationError::InvalidCollectionName { .. }));
	}

	#[test]
	fn absolute_timeframe_renders_as_json() {
		let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
		let end = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
		let params = Query::new(QueryType::Count, "signups")
			.timeframe(Timeframe::Absolute { start, end })
			.to_params()
			.unwrap();

		let rendered: Value = serde_json::from_str(param(&params, "timeframe").unwrap()).unwrap();
		assert_eq!(rendered["start"], start.to_rfc3339());
		assert_eq!(rendered["end"], end.to_rfc3339());
	}

	#[test]
	fn inverted_absolute_timeframe_is_rejected() {
		let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
		let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
		let result = Query::new(QueryType::Count, "signups")
			.timeframe(Timeframe::Absolute { start, end })
			.to_params();
		assert!(result.is_err());
	}

	#[test]
	fn group_by_and_filters_render() {
		let params = Query::new(QueryType::CountUnique, "visits")
			.target_property("user_id")
			.group_by("country")
			.group_by("device")
			.filter(Filter::new("age", FilterOperator::GreaterThan, 18))
			.to_params()
			.unwrap();

		assert_eq!(param(&params, "group_by"), Some(r#"["country","device"]"#));
		let filters: Value = serde_json::from_str(param(&params, "filters").unwrap()).unwrap();
		assert_eq!(filters[0]["operator"], "gt");
		assert_eq!(filters[0]["property_value"], 18);
	}

	#[test]
	fn percentile_is_bounded() {
		let base = Query::new(QueryType::Percentile, "latency").target_property("ms");
		assert!(base.clone().to_params().is_err());
		assert!(base.clone().percentile(0.0).to_params().is_err());
		let params = base.percentile(99.5).to_params().unwrap();
		assert_eq!(param(&params, "percentile"), Some("99.5"));
	}

	#[test]
	fn extraction_renders_latest() {
		let params = Query::new(QueryType::Extraction, "purchases")
			.latest(10)
			.to_params()
			.unwrap();
		assert_eq!(param(&params, "latest"), Some("10"));
	}
}
