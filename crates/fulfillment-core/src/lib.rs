//! Core workflow logic for the fulfillment service.
//!
//! Order and production-task state machines, queue ranking and filtering,
//! production scheduling and forecasting, the label purchase saga, the
//! inventory ledger, commerce sync, insight orchestration and reports. The
//! [`FulfillmentEngine`] ties these together over one entity store and is
//! assembled from configuration by [`FulfillmentBuilder`].

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod queue;
pub mod reports;
pub mod scheduling;
pub mod state;

#[cfg(test)]
mod test_support;

pub use builder::{BuilderError, FulfillmentBuilder, FulfillmentFactories};
pub use engine::FulfillmentEngine;
pub use queue::{Queue, QueueFilter, QueueService};
pub use reports::{ReportError, ReportService};
pub use scheduling::{ProductionScheduler, SchedulingError};
pub use state::{OrderStateError, OrderStateMachine, TaskStateError, TaskStateMachine, Transition};
