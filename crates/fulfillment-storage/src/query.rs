//! Equality filters and sort orders over serialized records.
//!
//! Both operate on the JSON form of a record so the same code serves every
//! entity type.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Conjunction of exact top-level field equalities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
	fields: Map<String, Value>,
}

impl Filter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a `field == value` condition. Values that fail to serialize are
	/// compared as `null`.
	pub fn eq(mut self, field: impl Into<String>, value: impl Serialize) -> Self {
		let value = serde_json::to_value(value).unwrap_or(Value::Null);
		self.fields.insert(field.into(), value);
		self
	}

	/// Builds a filter from a JSON object; anything else yields `None`.
	pub fn from_value(value: Value) -> Option<Self> {
		match value {
			Value::Object(fields) => Some(Self { fields }),
			_ => None,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	pub fn matches(&self, record: &Value) -> bool {
		self.fields
			.iter()
			.all(|(field, expected)| record.get(field).unwrap_or(&Value::Null) == expected)
	}
}

/// Single-field sort order. Parsed from `field` (ascending) or `-field`
/// (descending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
	pub field: String,
	pub descending: bool,
}

impl Sort {
	pub fn asc(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			descending: false,
		}
	}

	pub fn desc(field: impl Into<String>) -> Self {
		Self {
			field: field.into(),
			descending: true,
		}
	}

	/// Parses `field` or `-field` (descending).
	pub fn parse(raw: &str) -> Self {
		match raw.strip_prefix('-') {
			Some(field) => Self::desc(field),
			None => Self::asc(raw),
		}
	}

	/// Compares two serialized records on this sort's field.
	pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
		let ordering = compare_values(
			a.get(&self.field).unwrap_or(&Value::Null),
			b.get(&self.field).unwrap_or(&Value::Null),
		);
		if self.descending {
			ordering.reverse()
		} else {
			ordering
		}
	}
}

impl Default for Sort {
	/// Newest first.
	fn default() -> Self {
		Self::desc("created_date")
	}
}

/// Orders JSON scalars: null first, then numbers numerically, RFC 3339
/// strings as instants, other strings lexicographically.
fn compare_values(a: &Value, b: &Value) -> Ordering {
	match (a, b) {
		(Value::Null, Value::Null) => Ordering::Equal,
		(Value::Null, _) => Ordering::Less,
		(_, Value::Null) => Ordering::Greater,
		(Value::Number(x), Value::Number(y)) => {
			let x = x.as_f64().unwrap_or(0.0);
			let y = y.as_f64().unwrap_or(0.0);
			x.partial_cmp(&y).unwrap_or(Ordering::Equal)
		},
		(Value::String(x), Value::String(y)) => match (parse_instant(x), parse_instant(y)) {
			(Some(x), Some(y)) => x.cmp(&y),
			_ => x.cmp(y),
		},
		(Value::Bool(x), Value::Bool(y)) => x.cmp(y),
		_ => a.to_string().cmp(&b.to_string()),
	}
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(s)
		.ok()
		.map(|dt| dt.with_timezone(&Utc))
}
