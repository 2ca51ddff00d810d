//! Property tax protest desk: customer intake, cascading customer deletion
//! and protest review over a relational record store.

pub mod config;
pub mod error;
pub mod gateways;
pub mod store;
pub mod telemetry;
pub mod workflows;

pub use config::AppConfig;
pub use error::AppError;
