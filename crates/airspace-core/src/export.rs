//! CRC line export.
//!
//! Turns merged group boundaries into one MultiLineString per group in the
//! GeoJSON dialect the vNAS CRC client imports as a video map. Over-dense
//! digitization and borders drawn twice are collapsed into single averaged
//! segments.

use geo::Coord;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

use crate::models::GroupPolygon;
use crate::spatial::{distance_km, midpoint, undirected_angle_diff_deg, undirected_bearing_deg};
use crate::tolerances::ExportTolerances;

pub const CRC_CRS_NAME: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

/// A kept boundary segment, possibly the average of several near-duplicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSegment {
    pub start: Coord,
    pub end: Coord,
}

impl ExportSegment {
    fn length_km(&self) -> f64 {
        distance_km(self.start, self.end)
    }

    fn bearing_deg(&self) -> f64 {
        undirected_bearing_deg(self.start, self.end)
    }

    fn midpoint(&self) -> Coord {
        midpoint(self.start, self.end)
    }

    fn is_horizontal(&self, band_deg: f64) -> bool {
        undirected_angle_diff_deg(self.bearing_deg(), 90.0) <= band_deg
    }

    /// Endpoint distance for the direct and the swapped pairing, in that order.
    fn pairing_km(&self, other: &ExportSegment) -> (f64, f64) {
        let direct = distance_km(self.start, other.start) + distance_km(self.end, other.end);
        let swapped = distance_km(self.start, other.end) + distance_km(self.end, other.start);
        (direct, swapped)
    }

    fn is_similar(&self, other: &ExportSegment, tolerances: &ExportTolerances) -> bool {
        let angle = undirected_angle_diff_deg(self.bearing_deg(), other.bearing_deg());
        let midpoint_km = distance_km(self.midpoint(), other.midpoint());

        if self.is_horizontal(tolerances.horizontal_band_deg)
            && other.is_horizontal(tolerances.horizontal_band_deg)
        {
            return angle < tolerances.horizontal_max_angle_deg
                && midpoint_km < tolerances.horizontal_midpoint_km;
        }

        if angle >= tolerances.max_angle_deg {
            return false;
        }

        let (direct, swapped) = self.pairing_km(other);
        let (near_start, near_end) = if direct <= swapped {
            (
                distance_km(self.start, other.start),
                distance_km(self.end, other.end),
            )
        } else {
            (
                distance_km(self.start, other.end),
                distance_km(self.end, other.start),
            )
        };
        if near_start < tolerances.endpoint_km && near_end < tolerances.endpoint_km {
            return true;
        }

        let (a, b) = (self.length_km(), other.length_km());
        let longest = a.max(b);
        let comparable = longest > 0.0 && (a - b).abs() / longest <= tolerances.length_ratio;
        midpoint_km < tolerances.endpoint_km && comparable
    }

    /// Endpoint-wise average using whichever pairing is closer.
    fn averaged_with(&self, other: &ExportSegment) -> ExportSegment {
        let (direct, swapped) = self.pairing_km(other);
        let (other_start, other_end) = if direct <= swapped {
            (other.start, other.end)
        } else {
            (other.end, other.start)
        };
        ExportSegment {
            start: midpoint(self.start, other_start),
            end: midpoint(self.end, other_end),
        }
    }
}

/// Slice a group's outer rings into deduplicated segments.
pub fn segment_group(group: &GroupPolygon, tolerances: &ExportTolerances) -> Vec<ExportSegment> {
    let mut kept: Vec<ExportSegment> = Vec::new();

    for ring in group.geometry.outer_rings() {
        for line in ring.lines() {
            let segment = ExportSegment {
                start: line.start,
                end: line.end,
            };
            if segment.length_km() < tolerances.min_segment_km {
                continue;
            }
            match kept
                .iter()
                .position(|existing| existing.is_similar(&segment, tolerances))
            {
                Some(index) => kept[index] = kept[index].averaged_with(&segment),
                None => kept.push(segment),
            }
        }
    }

    kept
}

/// Rendering defaults CRC expects as the first feature of an imported map.
fn style_defaults_feature() -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("isLineDefaults".into(), json!(true));
    properties.insert("bcg".into(), json!(1));
    properties.insert("filters".into(), json!([1]));
    properties.insert("style".into(), json!("Solid"));
    properties.insert("thickness".into(), json!(1));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![90.0, 180.0]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn segments_feature(group: &GroupPolygon, segments: &[ExportSegment]) -> Feature {
    let lines: Vec<Vec<Vec<f64>>> = segments
        .iter()
        .map(|segment| {
            vec![
                vec![segment.start.x, segment.start.y],
                vec![segment.end.x, segment.end.y],
            ]
        })
        .collect();

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::MultiLineString(lines))),
        id: None,
        properties: Some(group.group.to_properties()),
        foreign_members: None,
    }
}

/// Build the CRC import collection for `groups`.
///
/// Groups whose every segment is filtered out are omitted.
pub fn export_crc(
    split_name: &str,
    groups: &[GroupPolygon],
    tolerances: &ExportTolerances,
) -> FeatureCollection {
    let mut features = vec![style_defaults_feature()];
    for group in groups {
        let segments = segment_group(group, tolerances);
        if segments.is_empty() {
            tracing::debug!(group_id = %group.group.group_id, "No exportable segments");
            continue;
        }
        features.push(segments_feature(group, &segments));
    }

    let mut foreign_members = JsonObject::new();
    foreign_members.insert("name".into(), json!(format!("{split_name} Export")));
    foreign_members.insert(
        "crs".into(),
        json!({ "type": "name", "properties": { "name": CRC_CRS_NAME } }),
    );

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}
