//! Order status state machine.
//!
//! Workflow actions are named transitions, each allowed from a fixed set of
//! source states. How the source state is checked depends on the configured
//! [`ConcurrencyMode`]: last-write-wins checks the status read when the
//! request arrives and then overwrites, compare-and-swap re-checks it under
//! the store's write lock.

use fulfillment_config::ConcurrencyMode;
use fulfillment_storage::{StorageError, StorageService};
use fulfillment_types::{truncate_id, Order, OrderStatus, Priority};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Cannot {action} an order that is {from}")]
	InvalidTransition {
		action: &'static str,
		from: OrderStatus,
	},
	/// The order changed status between read and write.
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Validation error: {0}")]
	Validation(String),
	/// A bulk transition stopped part-way. Orders in `applied` keep their
	/// new status.
	#[error("Bulk {action} stopped at order {failed_id} after {} update(s): {source}", .applied.len())]
	BulkAborted {
		action: &'static str,
		applied: Vec<String>,
		failed_id: String,
		#[source]
		source: Box<OrderStateError>,
	},
}

impl From<StorageError> for OrderStateError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound(id) => OrderStateError::NotFound(id),
			StorageError::Conflict(message) => OrderStateError::Conflict(message),
			other => OrderStateError::Storage(other.to_string()),
		}
	}
}

/// A workflow action on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Transition {
	MoveToProduction,
	/// Records who staged the order.
	MoveToStaging { staged_by: String },
	BackToPending,
	PutOnHold,
	/// Packing found a problem; the note replaces the special instructions.
	FlagIssue { note: String },
	MarkReadyToShip,
	Cancel,
	MarkShipped,
	MarkDelivered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TransitionKind {
	MoveToProduction,
	MoveToStaging,
	BackToPending,
	PutOnHold,
	FlagIssue,
	MarkReadyToShip,
	Cancel,
	MarkShipped,
	MarkDelivered,
}

// States each action may be triggered from.
static SOURCES: Lazy<HashMap<TransitionKind, HashSet<OrderStatus>>> = Lazy::new(|| {
	use OrderStatus::*;
	HashMap::from([
		(TransitionKind::MoveToProduction, HashSet::from([Pending, Staging, Hold])),
		(TransitionKind::MoveToStaging, HashSet::from([Production])),
		(TransitionKind::BackToPending, HashSet::from([Production, Hold])),
		(TransitionKind::PutOnHold, HashSet::from([Pending, Production, Staging, Processing])),
		(TransitionKind::FlagIssue, HashSet::from([Staging])),
		(TransitionKind::MarkReadyToShip, HashSet::from([Staging, Processing])),
		(TransitionKind::Cancel, HashSet::from([Pending, Hold])),
		(TransitionKind::MarkShipped, HashSet::from([Processing])),
		(TransitionKind::MarkDelivered, HashSet::from([Shipped])),
	])
});

impl Transition {
	fn kind(&self) -> TransitionKind {
		match self {
			Transition::MoveToProduction => TransitionKind::MoveToProduction,
			Transition::MoveToStaging { .. } => TransitionKind::MoveToStaging,
			Transition::BackToPending => TransitionKind::BackToPending,
			Transition::PutOnHold => TransitionKind::PutOnHold,
			Transition::FlagIssue { .. } => TransitionKind::FlagIssue,
			Transition::MarkReadyToShip => TransitionKind::MarkReadyToShip,
			Transition::Cancel => TransitionKind::Cancel,
			Transition::MarkShipped => TransitionKind::MarkShipped,
			Transition::MarkDelivered => TransitionKind::MarkDelivered,
		}
	}

	/// Wire name of the action.
	pub fn name(&self) -> &'static str {
		match self.kind() {
			TransitionKind::MoveToProduction => "move_to_production",
			TransitionKind::MoveToStaging => "move_to_staging",
			TransitionKind::BackToPending => "back_to_pending",
			TransitionKind::PutOnHold => "put_on_hold",
			TransitionKind::FlagIssue => "flag_issue",
			TransitionKind::MarkReadyToShip => "mark_ready_to_ship",
			TransitionKind::Cancel => "cancel",
			TransitionKind::MarkShipped => "mark_shipped",
			TransitionKind::MarkDelivered => "mark_delivered",
		}
	}

	/// Status the order ends up in.
	pub fn target(&self) -> OrderStatus {
		match self.kind() {
			TransitionKind::MoveToProduction => OrderStatus::Production,
			TransitionKind::MoveToStaging => OrderStatus::Staging,
			TransitionKind::BackToPending => OrderStatus::Pending,
			TransitionKind::PutOnHold | TransitionKind::FlagIssue => OrderStatus::Hold,
			TransitionKind::MarkReadyToShip => OrderStatus::Processing,
			TransitionKind::Cancel => OrderStatus::Cancelled,
			TransitionKind::MarkShipped => OrderStatus::Shipped,
			TransitionKind::MarkDelivered => OrderStatus::Delivered,
		}
	}

	/// Whether the action may be triggered from `status`.
	pub fn allowed_from(&self, status: OrderStatus) -> bool {
		SOURCES
			.get(&self.kind())
			.is_some_and(|sources| sources.contains(&status))
	}

	/// Checks the action's own arguments. Runs before any read or write.
	fn validate(&self) -> Result<(), OrderStateError> {
		match self {
			Transition::MoveToStaging { staged_by } if staged_by.trim().is_empty() => Err(
				OrderStateError::Validation("staging requires the acting user".into()),
			),
			Transition::FlagIssue { note } if note.trim().is_empty() => Err(
				OrderStateError::Validation("flagging an issue requires a note".into()),
			),
			_ => Ok(()),
		}
	}

	fn apply(&self, order: &mut Order) {
		order.status = self.target();
		match self {
			Transition::MoveToStaging { staged_by } => {
				order.staged_by = Some(staged_by.trim().to_string());
			},
			Transition::FlagIssue { note } => {
				order.special_instructions = Some(note.trim().to_string());
			},
			_ => {},
		}
	}
}

/// Applies workflow transitions to stored orders.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
	mode: ConcurrencyMode,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>, mode: ConcurrencyMode) -> Self {
		Self { storage, mode }
	}

	pub fn mode(&self) -> ConcurrencyMode {
		self.mode
	}

	pub async fn get_order(&self, order_id: &str) -> Result<Order, OrderStateError> {
		Ok(self.storage.get(order_id).await?)
	}

	/// Applies one transition to one order.
	pub async fn transition(
		&self,
		order_id: &str,
		transition: &Transition,
	) -> Result<Order, OrderStateError> {
		transition.validate()?;

		let order = match self.mode {
			ConcurrencyMode::LastWriteWins => {
				let current = self.get_order(order_id).await?;
				if !transition.allowed_from(current.status) {
					return Err(OrderStateError::InvalidTransition {
						action: transition.name(),
						from: current.status,
					});
				}
				self.storage
					.update_with(order_id, |order: &mut Order| {
						transition.apply(order);
						Ok::<(), OrderStateError>(())
					})
					.await?
			},
			ConcurrencyMode::CompareAndSwap => {
				self.storage
					.update_guarded(
						order_id,
						|order: &Order| {
							if transition.allowed_from(order.status) {
								Ok(())
							} else {
								Err(format!(
									"order {} is {}; {} is not allowed",
									order.order_number,
									order.status,
									transition.name()
								))
							}
						},
						|order: &mut Order| transition.apply(order),
					)
					.await?
			},
		};

		tracing::info!(
			component = "workflow",
			order_id = %truncate_id(order_id),
			action = transition.name(),
			status = %order.status,
			"Order transitioned"
		);
		Ok(order)
	}

	/// Applies a transition to each order in selection order.
	///
	/// The first failure stops the batch. Updates already applied are kept
	/// and listed in the returned error.
	pub async fn bulk_transition(
		&self,
		order_ids: &[String],
		transition: &Transition,
	) -> Result<Vec<Order>, OrderStateError> {
		if order_ids.is_empty() {
			return Err(OrderStateError::Validation("no orders selected".into()));
		}
		transition.validate()?;

		let mut updated = Vec::with_capacity(order_ids.len());
		for order_id in order_ids {
			match self.transition(order_id, transition).await {
				Ok(order) => updated.push(order),
				Err(e) => {
					let applied: Vec<String> = updated.iter().map(|o| o.meta.id.clone()).collect();
					tracing::warn!(
						component = "workflow",
						action = transition.name(),
						applied = applied.len(),
						failed_id = %order_id,
						error = %e,
						"Bulk transition stopped"
					);
					return Err(OrderStateError::BulkAborted {
						action: transition.name(),
						applied,
						failed_id: order_id.clone(),
						source: Box::new(e),
					});
				},
			}
		}
		Ok(updated)
	}

	/// Sets the order to `processing` whatever its current status. Used
	/// after a label has been purchased.
	pub async fn mark_label_created(&self, order_id: &str) -> Result<Order, OrderStateError> {
		Ok(self
			.storage
			.update_with(order_id, |order: &mut Order| {
				order.status = OrderStatus::Processing;
				Ok::<(), StorageError>(())
			})
			.await?)
	}

	pub async fn set_priority(
		&self,
		order_id: &str,
		priority: Priority,
	) -> Result<Order, OrderStateError> {
		let order = self
			.storage
			.update_with(order_id, |order: &mut Order| {
				order.priority = priority;
				Ok::<(), StorageError>(())
			})
			.await?;
		tracing::info!(
			component = "workflow",
			order_id = %truncate_id(order_id),
			priority = %priority,
			"Priority changed"
		);
		Ok(order)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{manual_order, memory_storage, FlakyStorage};
	use serde_json::json;

	async fn seeded(
		storage: &Arc<StorageService>,
		status: OrderStatus,
	) -> Order {
		let mut order = manual_order("1001", "US");
		order.status = status;
		storage.create(order).await.unwrap()
	}

	#[test]
	fn test_every_transition_targets_a_known_status() {
		let transitions = [
			Transition::MoveToProduction,
			Transition::MoveToStaging {
				staged_by: "sam".into(),
			},
			Transition::BackToPending,
			Transition::PutOnHold,
			Transition::FlagIssue { note: "dent".into() },
			Transition::MarkReadyToShip,
			Transition::Cancel,
			Transition::MarkShipped,
			Transition::MarkDelivered,
		];
		for transition in &transitions {
			assert!(OrderStatus::ALL.contains(&transition.target()));
		}
		assert!(Transition::Cancel.allowed_from(OrderStatus::Hold));
		assert!(!Transition::Cancel.allowed_from(OrderStatus::Staging));
		assert!(Transition::MoveToProduction.allowed_from(OrderStatus::Staging));
	}

	#[test]
	fn test_transition_wire_format() {
		let parsed: Transition =
			serde_json::from_value(json!({ "action": "flag_issue", "note": "missing part" })).unwrap();
		assert_eq!(
			parsed,
			Transition::FlagIssue {
				note: "missing part".into()
			}
		);
		assert!(serde_json::from_value::<Transition>(json!({ "action": "teleport" })).is_err());
	}

	#[tokio::test]
	async fn test_move_to_staging_stamps_actor() {
		let storage = memory_storage();
		let order = seeded(&storage, OrderStatus::Production).await;
		let machine = OrderStateMachine::new(storage.clone(), ConcurrencyMode::LastWriteWins);

		let staged = machine
			.transition(
				&order.meta.id,
				&Transition::MoveToStaging {
					staged_by: "sam".into(),
				},
			)
			.await
			.unwrap();
		assert_eq!(staged.status, OrderStatus::Staging);
		assert_eq!(staged.staged_by.as_deref(), Some("sam"));

		let held = machine
			.transition(&order.meta.id, &Transition::PutOnHold)
			.await
			.unwrap();
		assert_eq!(held.staged_by.as_deref(), Some("sam"));
	}

	#[tokio::test]
	async fn test_flag_issue_with_empty_note_writes_nothing() {
		let storage = memory_storage();
		let order = seeded(&storage, OrderStatus::Staging).await;
		let machine = OrderStateMachine::new(storage.clone(), ConcurrencyMode::LastWriteWins);

		let result = machine
			.transition(&order.meta.id, &Transition::FlagIssue { note: "   ".into() })
			.await;
		assert!(matches!(result, Err(OrderStateError::Validation(_))));

		let stored: Order = storage.get(&order.meta.id).await.unwrap();
		assert_eq!(stored.status, OrderStatus::Staging);
		assert_eq!(stored.meta.updated_date, order.meta.updated_date);
		assert_eq!(stored.special_instructions, None);

		let flagged = machine
			.transition(&order.meta.id, &Transition::FlagIssue { note: "Cracked glaze".into() })
			.await
			.unwrap();
		assert_eq!(flagged.status, OrderStatus::Hold);
		assert_eq!(flagged.special_instructions.as_deref(), Some("Cracked glaze"));
	}

	#[tokio::test]
	async fn test_invalid_source_state_is_rejected() {
		let storage = memory_storage();
		let order = seeded(&storage, OrderStatus::Shipped).await;
		let machine = OrderStateMachine::new(storage.clone(), ConcurrencyMode::LastWriteWins);

		let result = machine.transition(&order.meta.id, &Transition::Cancel).await;
		assert!(matches!(
			result,
			Err(OrderStateError::InvalidTransition {
				action: "cancel",
				from: OrderStatus::Shipped
			})
		));
	}

	#[tokio::test]
	async fn test_compare_and_swap_reports_conflict() {
		let storage = memory_storage();
		let order = seeded(&storage, OrderStatus::Pending).await;
		let machine = OrderStateMachine::new(storage.clone(), ConcurrencyMode::CompareAndSwap);

		machine
			.transition(&order.meta.id, &Transition::MoveToProduction)
			.await
			.unwrap();
		// A second member of staff acting on the stale "pending" view.
		let result = machine.transition(&order.meta.id, &Transition::Cancel).await;
		match result {
			Err(OrderStateError::Conflict(message)) => assert!(message.contains("production")),
			other => panic!("expected conflict, got {:?}", other),
		}
		let stored: Order = storage.get(&order.meta.id).await.unwrap();
		assert_eq!(stored.status, OrderStatus::Production);
	}

	#[tokio::test]
	async fn test_status_stays_in_vocabulary() {
		let storage = memory_storage();
		let order = seeded(&storage, OrderStatus::Pending).await;

		let result = storage
			.update::<Order>(&order.meta.id, json!({ "status": "in_transit" }))
			.await;
		assert!(matches!(result, Err(StorageError::Validation(_))));

		let machine = OrderStateMachine::new(storage.clone(), ConcurrencyMode::LastWriteWins);
		for transition in [
			Transition::MoveToProduction,
			Transition::BackToPending,
			Transition::PutOnHold,
			Transition::Cancel,
		] {
			let order = machine.transition(&order.meta.id, &transition).await.unwrap();
			assert!(OrderStatus::ALL.contains(&order.status));
		}
	}

	#[tokio::test]
	async fn test_bulk_transition_keeps_updates_before_failure() {
		let flaky = FlakyStorage::new();
		let storage = flaky.service();
		let mut ids = Vec::new();
		for n in 0..6 {
			let mut order = manual_order(&format!("10{}", n), "US");
			order.status = OrderStatus::Pending;
			ids.push(storage.create(order).await.unwrap().meta.id);
		}
		// The third of six updates fails.
		flaky.fail_writes_to(&format!("orders:{}", ids[2]));

		let machine = OrderStateMachine::new(storage.clone(), ConcurrencyMode::LastWriteWins);
		let error = machine
			.bulk_transition(&ids, &Transition::MoveToProduction)
			.await
			.unwrap_err();

		match error {
			OrderStateError::BulkAborted {
				applied, failed_id, ..
			} => {
				assert_eq!(applied, ids[..2].to_vec());
				assert_eq!(failed_id, ids[2]);
			},
			other => panic!("expected bulk abort, got {:?}", other),
		}

		for (index, id) in ids.iter().enumerate() {
			let stored: Order = storage.get(id).await.unwrap();
			let expected = if index < 2 {
				OrderStatus::Production
			} else {
				OrderStatus::Pending
			};
			assert_eq!(stored.status, expected, "order {}", index);
		}
	}

	#[tokio::test]
	async fn test_mark_label_created_is_unconditional() {
		let storage = memory_storage();
		let order = seeded(&storage, OrderStatus::Hold).await;
		let machine = OrderStateMachine::new(storage.clone(), ConcurrencyMode::CompareAndSwap);

		let order = machine.mark_label_created(&order.meta.id).await.unwrap();
		assert_eq!(order.status, OrderStatus::Processing);
		let order = machine.mark_label_created(&order.meta.id).await.unwrap();
		assert_eq!(order.status, OrderStatus::Processing);
	}

	#[tokio::test]
	async fn test_missing_order_is_not_found() {
		let machine = OrderStateMachine::new(memory_storage(), ConcurrencyMode::CompareAndSwap);
		let result = machine.transition("nope", &Transition::PutOnHold).await;
		assert!(matches!(result, Err(OrderStateError::NotFound(_))));
	}
}
