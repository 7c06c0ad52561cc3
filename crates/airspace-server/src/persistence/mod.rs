//! Persistence layer for split configurations.
//!
//! SQLite-backed storage for sector metadata, splits, groups and the
//! group-to-area assignments the boundary pipeline reads.

pub mod areas;
pub mod db;
pub mod splits;

pub use db::{init_database, Database};
