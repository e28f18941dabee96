//! State machines for orders and production tasks.
//!
//! Both persist through the entity store and never hold state of their own
//! beyond the configured concurrency mode.

pub mod order;
pub mod task;

pub use order::{OrderStateError, OrderStateMachine, Transition};
pub use task::{TaskAction, TaskStateError, TaskStateMachine};
