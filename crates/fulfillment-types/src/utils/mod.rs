//! Small helpers shared across the fulfillment crates.

use thiserror::Error;

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

/// Error returned when a string is outside one of the closed vocabularies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
	pub kind: &'static str,
	pub value: String,
}

/// Shortens an identifier for log output.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}

/// Rounds an hour figure to two decimals for reporting.
pub fn round_hours(hours: f64) -> f64 {
	(hours * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("abc"), "abc");
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("123456789"), "12345678..");
	}

	#[test]
	fn test_round_hours() {
		assert_eq!(round_hours(1.23456), 1.23);
		assert_eq!(round_hours(2.0), 2.0);
	}
}
