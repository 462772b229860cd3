//! Delivery database bootstrap.
//!
//! Creates the `deliveries` collection, seeds sample deliveries, indexes the
//! collection and provisions the application user the delivery service logs
//! in with.

pub mod bootstrap;
pub mod modules;
pub mod verify;

pub use bootstrap::{run, BootstrapPlan, BootstrapReport, COMPLETION_MESSAGE};
pub use modules::deliveries::models::{Delivery, DeliveryStatus};
pub use verify::{verify, VerifyReport};
