//! Storage seam for the delivery bootstrap.
//!
//! [`Store`] is the handful of operations the bootstrap needs from a document
//! database. [`MongoStore`] talks to a real server; [`MemoryStore`] mirrors
//! its conflict semantics in process for tests.

pub mod error;
pub mod memory;
pub mod mongo;
pub mod pipeline;
pub mod store;

pub use error::DbError;
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use pipeline::{Pipeline, Step, StepOutcome, StepOutput, StepReport};
pub use store::{NewUser, RoleGrant, Store};
