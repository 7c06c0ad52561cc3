//! Polygon primitives over the `geo` crate.
//!
//! Everything here works in WGS84 lon/lat degrees. Distances are accepted in
//! metres and converted to a degree equivalent at the geometry's latitude.

use geo::{
    BooleanOps, BoundingRect, Buffer, Coord, Geometry, Intersects, LineString, MultiPolygon,
    Point, Polygon, Rect, Simplify,
};
use geojson::GeoJson;
use std::panic::{self, AssertUnwindSafe};

use crate::error::GeometryError;
use crate::spatial::meters_to_degrees;

/// Merged geometry of one group: a single polygon, or several disjoint parts.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl GroupGeometry {
    /// Wrap dissolved parts. `None` when nothing is left.
    pub fn from_polygons(mut polygons: Vec<Polygon<f64>>) -> Option<Self> {
        match polygons.len() {
            0 => None,
            1 => polygons.pop().map(GroupGeometry::Polygon),
            _ => Some(GroupGeometry::MultiPolygon(MultiPolygon::new(polygons))),
        }
    }

    pub fn polygons(&self) -> Vec<&Polygon<f64>> {
        match self {
            GroupGeometry::Polygon(polygon) => vec![polygon],
            GroupGeometry::MultiPolygon(multi) => multi.0.iter().collect(),
        }
    }

    pub fn outer_rings(&self) -> Vec<&LineString<f64>> {
        self.polygons().into_iter().map(Polygon::exterior).collect()
    }

    /// Replace every exterior ring, in `outer_rings` order.
    pub fn set_outer_rings(&mut self, mut rings: Vec<LineString<f64>>) {
        match self {
            GroupGeometry::Polygon(polygon) => {
                if let Some(ring) = rings.pop() {
                    *polygon = Polygon::new(ring, Vec::new());
                }
            }
            GroupGeometry::MultiPolygon(multi) => {
                for (polygon, ring) in multi.0.iter_mut().zip(rings) {
                    *polygon = Polygon::new(ring, Vec::new());
                }
            }
        }
    }

    pub fn interior_ring_count(&self) -> usize {
        self.polygons().iter().map(|p| p.interiors().len()).sum()
    }

    pub fn to_geojson(&self) -> geojson::Geometry {
        let value = match self {
            GroupGeometry::Polygon(polygon) => geojson::Value::from(polygon),
            GroupGeometry::MultiPolygon(multi) => geojson::Value::from(multi),
        };
        geojson::Geometry::new(value)
    }
}

/// Split any polygonal geometry into its constituent polygons.
pub fn explode(geometry: &Geometry<f64>) -> Vec<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => vec![polygon.clone()],
        Geometry::MultiPolygon(multi) => multi.0.clone(),
        Geometry::GeometryCollection(collection) => collection.iter().flat_map(explode).collect(),
        _ => Vec::new(),
    }
}

/// Keep the exterior ring only.
pub fn remove_holes(polygon: Polygon<f64>) -> Polygon<f64> {
    let (exterior, _) = polygon.into_inner();
    Polygon::new(exterior, Vec::new())
}

/// Latitude at the centre of the geometry's bounding box.
fn reference_lat<G: BoundingRect<f64>>(geometry: &G) -> f64 {
    let rect: Option<Rect<f64>> = geometry.bounding_rect().into();
    rect.map(|rect| rect.center().y).unwrap_or(0.0)
}

pub fn buffer_polygon(polygon: &Polygon<f64>, meters: f64) -> MultiPolygon<f64> {
    let distance = meters_to_degrees(meters, reference_lat(polygon));
    polygon.buffer(distance)
}

pub fn buffer_multi_polygon(multi: &MultiPolygon<f64>, meters: f64) -> MultiPolygon<f64> {
    let distance = meters.signum() * meters_to_degrees(meters.abs(), reference_lat(multi));
    multi.buffer(distance)
}

pub fn buffer_line(line: &LineString<f64>, meters: f64) -> MultiPolygon<f64> {
    let distance = meters_to_degrees(meters, reference_lat(line));
    line.buffer(distance)
}

/// Run a geometry operation, turning a backend panic into an error message.
///
/// The boolean-op and offset backends can panic on degenerate or non-finite
/// rings.
pub fn contain_panic<T>(op: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(op)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "geometry operation panicked".to_string())
    })
}

/// Dissolve every polygon into one multipolygon.
///
/// A backend panic is reported as [`GeometryError::UnionFailed`].
pub fn union_all(polygons: &[Polygon<f64>]) -> Result<MultiPolygon<f64>, GeometryError> {
    let merged = contain_panic(|| {
        polygons
            .iter()
            .fold(MultiPolygon::new(Vec::new()), |acc, polygon| acc.union(polygon))
    })
    .map_err(GeometryError::UnionFailed)?;

    if merged.0.is_empty() {
        return Err(GeometryError::EmptyResult);
    }
    Ok(merged)
}

/// Ramer-Douglas-Peucker simplification of the exterior ring.
///
/// A ring that would collapse below a triangle, or that the backend cannot
/// simplify, keeps its original vertices.
pub fn simplify_polygon(polygon: &Polygon<f64>, tolerance_deg: f64) -> Polygon<f64> {
    match contain_panic(|| polygon.simplify(tolerance_deg)) {
        Ok(simplified) if simplified.exterior().0.len() >= 4 => simplified,
        _ => polygon.clone(),
    }
}

pub fn point_within(area: &MultiPolygon<f64>, coord: Coord) -> bool {
    area.intersects(&Point::from(coord))
}

/// Collect every Polygon and MultiPolygon found in a GeoJSON document.
///
/// Accepts a FeatureCollection, a single Feature or a bare Geometry. Features
/// without geometry and non-polygonal geometries are skipped.
pub fn polygons_from_geojson(
    value: &serde_json::Value,
) -> Result<Vec<Geometry<f64>>, GeometryError> {
    let document: GeoJson = serde_json::from_value(value.clone())
        .map_err(|err| GeometryError::InvalidGeoJson(err.to_string()))?;

    let geometries: Vec<geojson::Geometry> = match document {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry)
            .collect(),
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::Geometry(geometry) => vec![geometry],
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        collect_polygonal(geometry.value, &mut polygons)?;
    }
    Ok(polygons)
}

fn collect_polygonal(
    value: geojson::Value,
    out: &mut Vec<Geometry<f64>>,
) -> Result<(), GeometryError> {
    match value {
        geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_) => {
            let geometry = Geometry::<f64>::try_from(value)
                .map_err(|err| GeometryError::InvalidGeoJson(err.to_string()))?;
            out.push(geometry);
        }
        geojson::Value::GeometryCollection(members) => {
            for member in members {
                collect_polygonal(member.value, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}
