//! Read-only production statistics over the task list.

use chrono::{Duration, NaiveDate};
use fulfillment_types::{round_hours, ProductionTask, TaskStatus};
use serde::{Deserialize, Serialize};

/// Completions on one day of the trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCompletion {
	pub date: NaiveDate,
	pub completed: u32,
	pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
	/// Oldest day first, ending today.
	pub history: Vec<DailyCompletion>,
	pub average_daily_rate: f64,
	pub scheduled_count: usize,
	/// `None` when nothing was completed in the window.
	pub days_to_clear: Option<u32>,
	pub projected_clear_date: Option<NaiveDate>,
	/// Estimation accuracy in percent. Can be negative.
	pub accuracy: Option<f64>,
	pub average_estimated_hours: Option<f64>,
	pub average_actual_hours: Option<f64>,
}

/// Computes the forecast for `today` over a window of `window_days` days.
pub fn forecast(tasks: &[ProductionTask], today: NaiveDate, window_days: u32) -> Forecast {
	let window_days = window_days.max(1);
	let first_day = today - Duration::days(i64::from(window_days) - 1);

	let mut history: Vec<DailyCompletion> = (0..window_days)
		.map(|offset| DailyCompletion {
			date: first_day + Duration::days(i64::from(offset)),
			completed: 0,
			hours: 0.0,
		})
		.collect();

	for task in tasks.iter().filter(|t| t.status == TaskStatus::Completed) {
		let Some(ended) = task.actual_end.map(|end| end.date_naive()) else {
			continue;
		};
		if ended < first_day || ended > today {
			continue;
		}
		let index = (ended - first_day).num_days() as usize;
		if let Some(day) = history.get_mut(index) {
			day.completed += 1;
			day.hours += task.actual_hours.unwrap_or(task.estimated_hours);
		}
	}
	for day in &mut history {
		day.hours = round_hours(day.hours);
	}

	let completed_total: u32 = history.iter().map(|day| day.completed).sum();
	let scheduled_count = tasks
		.iter()
		.filter(|t| t.status == TaskStatus::Scheduled)
		.count();

	// ceil(scheduled / (total / window)) in integers.
	let days_to_clear = (completed_total > 0).then(|| {
		let numerator = scheduled_count as u64 * u64::from(window_days);
		numerator.div_ceil(u64::from(completed_total)) as u32
	});

	let (average_estimated_hours, average_actual_hours, accuracy) = estimation_accuracy(tasks);

	Forecast {
		history,
		average_daily_rate: f64::from(completed_total) / f64::from(window_days),
		scheduled_count,
		days_to_clear,
		projected_clear_date: days_to_clear.map(|days| today + Duration::days(i64::from(days))),
		accuracy,
		average_estimated_hours,
		average_actual_hours,
	}
}

fn estimation_accuracy(tasks: &[ProductionTask]) -> (Option<f64>, Option<f64>, Option<f64>) {
	let measured: Vec<(f64, f64)> = tasks
		.iter()
		.filter(|t| t.status == TaskStatus::Completed)
		.filter_map(|t| t.actual_hours.map(|actual| (t.estimated_hours, actual)))
		.collect();
	if measured.is_empty() {
		return (None, None, None);
	}

	let count = measured.len() as f64;
	let avg_estimated = measured.iter().map(|(e, _)| e).sum::<f64>() / count;
	let avg_actual = measured.iter().map(|(_, a)| a).sum::<f64>() / count;
	let accuracy = (avg_estimated > 0.0)
		.then(|| round_hours(100.0 * (1.0 - (avg_actual - avg_estimated).abs() / avg_estimated)));

	(
		Some(round_hours(avg_estimated)),
		Some(round_hours(avg_actual)),
		accuracy,
	)
}
