//! Tuning thresholds for the boundary pipeline.

use serde::{Deserialize, Serialize};

/// Thresholds for dissolving one group's polygons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeTolerances {
    /// Buffer applied before the union so abutting polygons connect (meters)
    pub gap_buffer_m: f64,
    /// Ramer-Douglas-Peucker tolerance applied after the union (degrees)
    pub simplify_tolerance_deg: f64,
}

impl Default for MergeTolerances {
    fn default() -> Self {
        Self {
            gap_buffer_m: 100.0,
            simplify_tolerance_deg: 0.01,
        }
    }
}

/// Thresholds for snapping borders shared by adjacent groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignTolerances {
    /// Half-width of the corridor around each outer ring (meters)
    pub line_buffer_m: f64,
    /// Maximum distance between an edge endpoint and a shared point (meters)
    pub snap_distance_m: f64,
}

impl Default for AlignTolerances {
    fn default() -> Self {
        Self {
            line_buffer_m: 50.0,
            snap_distance_m: 100.0,
        }
    }
}

/// Thresholds for the CRC line export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportTolerances {
    /// Segments shorter than this are digitization noise (km)
    pub min_segment_km: f64,
    /// Endpoint or midpoint proximity for two segments to be duplicates (km)
    pub endpoint_km: f64,
    /// Maximum direction difference for duplicates (degrees)
    pub max_angle_deg: f64,
    /// Allowed relative length difference for the midpoint test
    pub length_ratio: f64,
    /// Segments within this many degrees of east-west count as horizontal
    pub horizontal_band_deg: f64,
    /// Direction tolerance for horizontal duplicates (degrees)
    pub horizontal_max_angle_deg: f64,
    /// Midpoint proximity for horizontal duplicates (km)
    pub horizontal_midpoint_km: f64,
}

impl Default for ExportTolerances {
    fn default() -> Self {
        Self {
            min_segment_km: 0.3,
            endpoint_km: 1.0,
            max_angle_deg: 10.0,
            length_ratio: 0.25,
            horizontal_band_deg: 15.0,
            horizontal_max_angle_deg: 20.0,
            horizontal_midpoint_km: 1.5,
        }
    }
}

/// All pipeline thresholds, loadable from a JSON file with partial overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub merge: MergeTolerances,
    pub align: AlignTolerances,
    pub export: ExportTolerances,
}
