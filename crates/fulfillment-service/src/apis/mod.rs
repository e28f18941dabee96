//! HTTP handlers, one module per resource.

pub mod error;
pub mod integrations;
pub mod orders;
pub mod production;
pub mod products;
pub mod records;
pub mod reports;
pub mod shipments;
