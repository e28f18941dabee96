//! Time source abstraction.
//!
//! The store stamps `created_date`/`updated_date` and the workflow computes
//! elapsed hours and forecast windows from "now"; both take the current time
//! from a [`Clock`] so it can be pinned in tests.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
	now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: Arc::new(Mutex::new(start)),
		}
	}

	pub fn set(&self, at: DateTime<Utc>) {
		if let Ok(mut now) = self.now.lock() {
			*now = at;
		}
	}

	pub fn advance(&self, by: Duration) {
		if let Ok(mut now) = self.now.lock() {
			*now += by;
		}
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		match self.now.lock() {
			Ok(now) => *now,
			Err(poisoned) => *poisoned.into_inner(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_manual_clock_advances() {
		let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
		let clock = ManualClock::new(start);
		assert_eq!(clock.now(), start);
		clock.advance(Duration::hours(2));
		assert_eq!(clock.now(), start + Duration::hours(2));
	}
}
