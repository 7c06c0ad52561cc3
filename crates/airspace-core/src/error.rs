//! Errors raised by the geometry core.
//!
//! None of these reach the HTTP layer: the merge engine degrades on every
//! variant and keeps processing the remaining groups.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    /// The boolean-op backend panicked or rejected the input rings.
    #[error("polygon union failed: {0}")]
    UnionFailed(String),
    /// The operation completed but left no polygonal area behind.
    #[error("geometry operation produced an empty result")]
    EmptyResult,
    #[error("invalid GeoJSON: {0}")]
    InvalidGeoJson(String),
}
