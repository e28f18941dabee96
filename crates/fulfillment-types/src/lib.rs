//! Common types module for the fulfillment system.
//!
//! This module defines the records, workflow vocabularies and shared
//! infrastructure types used throughout the fulfillment workspace. Every
//! crate depends on it so that an `Order` or a `ProductionTask` means the
//! same thing in the store, the integrations, the core and the HTTP API.

#[macro_use]
mod macros;

/// API types for HTTP endpoints and error responses.
pub mod api;
/// Customer orders, line items and the order workflow vocabulary.
pub mod order;
/// Catalog products and the append-only stock ledger.
pub mod product;
/// Production tasks and workstations.
pub mod production;
/// Implementation registry used by pluggable integrations.
pub mod registry;
/// Redacting wrapper for passwords and API credentials.
pub mod secret_string;
/// Reference configuration records (box presets, packing configs, ...).
pub mod settings;
/// Carrier shipments and labels.
pub mod shipment;
/// Storage namespaces and the entity contract.
pub mod storage;
/// Small helpers shared across crates.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use order::*;
pub use product::*;
pub use production::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use settings::*;
pub use shipment::*;
pub use storage::*;
pub use utils::{round_hours, truncate_id, Clock, ManualClock, ParseEnumError, SystemClock};
pub use validation::*;
