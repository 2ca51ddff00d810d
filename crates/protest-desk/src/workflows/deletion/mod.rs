//! Cascading removal of a customer and every row that references them.
//!
//! Discovery is read-only and runs first. Tables are then cleared in the
//! order derived from the schema, so a store that enforces foreign keys never
//! sees an orphan. The login identity goes last and may fail without failing
//! the deletion.

mod discovery;
pub mod domain;
pub mod router;
pub mod service;

pub use discovery::CustomerFootprint;
pub use domain::{DeletionError, DeletionReport, DiscoveryStage, TableCount};
pub use router::deletion_router;
pub use service::CustomerDeletion;
