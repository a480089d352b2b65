//! Database module for the device inventory
//!
//! Provides SQLite storage for:
//! - Pseudonymous device records
//! - Append-only observation timelines
//! - Deduplicated alerts
//! - Maintenance windows and audit logs

pub mod connection;
pub mod models;
pub mod queries;
pub mod schema;

pub use connection::Database;
pub use models::*;
pub use queries::*;
