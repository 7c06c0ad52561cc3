//! Shared library surface for the airspace server and its tools.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod persistence;
pub mod state;
