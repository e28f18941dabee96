//! Handlers for user-triggered operations.
//!
//! Each handler owns one area of the workflow: order edits, label purchase,
//! stock adjustments, commerce sync and LLM insights. Status changes are
//! delegated to the state machines in [`crate::state`].

pub mod insight;
pub mod inventory;
pub mod label;
pub mod order;
pub mod sync;

pub use insight::{InsightHandler, InsightHandlerError};
pub use inventory::{AdjustmentRequest, InventoryError, InventoryHandler};
pub use label::{LabelDraft, LabelError, LabelHandler, LabelOutcome};
pub use order::{OrderDraft, OrderEdit, OrderError, OrderHandler, PackingLine, PackingView};
pub use sync::{ImportSummary, ProductSyncSummary, StatusPush, SyncError, SyncHandler};
