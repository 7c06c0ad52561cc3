//! Boundary merge engine.
//!
//! Dissolves every polygon assigned to a group (within one altitude tag) into
//! a single hole-free outline. Geometry failures never escape this module: a
//! group whose union fails degrades to its first polygon, and a group with no
//! usable geometry is dropped.

use geo::{MultiPolygon, Polygon};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::GeometryError;
use crate::geometry::{
    buffer_multi_polygon, buffer_polygon, contain_panic, explode, remove_holes, simplify_polygon,
    union_all, GroupGeometry,
};
use crate::models::{AreaPolygon, GroupInfo, GroupPolygon};
use crate::tolerances::MergeTolerances;

/// All input polygons sharing one (tag, group id) key.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub tag: String,
    pub group: GroupInfo,
    pub areas: Vec<AreaPolygon>,
}

/// Bucket area polygons by (tag, group id).
///
/// Polygons with an empty tag are ignored. The first record seen for a group
/// supplies its name and color.
pub fn partition(areas: Vec<AreaPolygon>) -> BTreeMap<(String, String), Bucket> {
    let mut buckets: BTreeMap<(String, String), Bucket> = BTreeMap::new();
    for area in areas {
        if area.tag.is_empty() {
            continue;
        }
        let key = (area.tag.clone(), area.group.group_id.clone());
        buckets
            .entry(key)
            .or_insert_with(|| Bucket {
                tag: area.tag.clone(),
                group: area.group.clone(),
                areas: Vec::new(),
            })
            .areas
            .push(area);
    }
    buckets
}

/// Merge one bucket into a single group boundary.
pub fn merge_group(
    tag: &str,
    group: &GroupInfo,
    areas: &[AreaPolygon],
    tolerances: &MergeTolerances,
) -> Option<GroupPolygon> {
    merge_group_with(tag, group, areas, tolerances, union_all)
}

fn merge_group_with(
    tag: &str,
    group: &GroupInfo,
    areas: &[AreaPolygon],
    tolerances: &MergeTolerances,
    union: impl Fn(&[Polygon<f64>]) -> Result<MultiPolygon<f64>, GeometryError>,
) -> Option<GroupPolygon> {
    let polygons: Vec<Polygon<f64>> = areas
        .iter()
        .flat_map(|area| explode(&area.geometry))
        .map(remove_holes)
        .filter(|polygon| polygon.exterior().0.len() >= 4)
        .collect();

    let Some(first) = polygons.first().cloned() else {
        debug!(tag, group_id = %group.group_id, "No mergeable polygons for group");
        return None;
    };

    let dissolved = if polygons.len() == 1 {
        Ok(vec![first.clone()])
    } else {
        contain_panic(|| dissolve_with(&polygons, tolerances.gap_buffer_m, &union))
            .map_err(GeometryError::UnionFailed)
            .and_then(|result| result)
    };

    let parts: Vec<Polygon<f64>> = match dissolved {
        Ok(parts) => parts
            .into_iter()
            .map(remove_holes)
            .map(|polygon| simplify_polygon(&polygon, tolerances.simplify_tolerance_deg))
            .collect(),
        Err(err) => {
            warn!(
                tag,
                group_id = %group.group_id,
                "Falling back to first polygon: {}",
                err
            );
            vec![first]
        }
    };

    GroupGeometry::from_polygons(parts).map(|geometry| GroupPolygon {
        tag: tag.to_string(),
        group: group.clone(),
        geometry,
    })
}

/// Buffer, union, then erode by the same distance.
///
/// Dilation bridges digitization gaps between neighbouring sectors; erosion
/// puts the untouched outer border back where it was drawn.
fn dissolve_with(
    polygons: &[Polygon<f64>],
    gap_buffer_m: f64,
    union: impl Fn(&[Polygon<f64>]) -> Result<MultiPolygon<f64>, GeometryError>,
) -> Result<Vec<Polygon<f64>>, GeometryError> {
    let buffered: Vec<Polygon<f64>> = polygons
        .iter()
        .flat_map(|polygon| buffer_polygon(polygon, gap_buffer_m).0)
        .collect();

    let dilated = union(&buffered)?;
    let eroded = buffer_multi_polygon(&dilated, -gap_buffer_m);

    if eroded.0.is_empty() {
        debug!("Erosion removed every part; keeping the dilated union");
        return Ok(dilated.0);
    }
    Ok(eroded.0)
}

/// Merge every (tag, group) bucket, ordered by tag then group id.
pub fn merge_all(areas: Vec<AreaPolygon>, tolerances: &MergeTolerances) -> Vec<GroupPolygon> {
    partition(areas)
        .into_values()
        .filter_map(|bucket| merge_group(&bucket.tag, &bucket.group, &bucket.areas, tolerances))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area, Geometry};

    fn info(id: &str) -> GroupInfo {
        GroupInfo {
            group_id: id.to_string(),
            group_name: format!("Group {id}"),
            group_color: "#00ff00".to_string(),
        }
    }

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ]
    }

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
        polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
        ]
    }

    fn area(group: &str, tag: &str, polygon: Polygon<f64>) -> AreaPolygon {
        AreaPolygon::new(info(group), tag, Geometry::Polygon(polygon))
    }

    fn area_of(group: &GroupPolygon) -> f64 {
        group.geometry.polygons().iter().map(|p| p.unsigned_area()).sum()
    }

    #[test]
    fn partition_is_exhaustive_per_tag() {
        let areas = vec![
            area("a", "high", square(0.0, 0.0, 1.0)),
            area("a", "low", square(0.0, 0.0, 1.0)),
            area("b", "high", square(1.0, 0.0, 1.0)),
            area("a", "high", square(0.0, 1.0, 1.0)),
            area("c", "", square(5.0, 5.0, 1.0)),
        ];
        let buckets = partition(areas);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[&("high".to_string(), "a".to_string())].areas.len(), 2);
        assert!(buckets.keys().all(|(tag, _)| !tag.is_empty()));
    }

    #[test]
    fn empty_bucket_produces_nothing() {
        assert!(merge_group("high", &info("a"), &[], &MergeTolerances::default()).is_none());
    }

    #[test]
    fn single_polygon_keeps_its_shape_without_holes() {
        let hole = square(0.25, 0.25, 0.5).exterior().clone();
        let holed = Polygon::new(square(0.0, 0.0, 1.0).exterior().clone(), vec![hole]);
        let merged = merge_group(
            "high",
            &info("a"),
            &[area("a", "high", holed)],
            &MergeTolerances::default(),
        )
        .unwrap();

        assert_eq!(merged.geometry, GroupGeometry::Polygon(square(0.0, 0.0, 1.0)));
        assert_eq!(merged.geometry.interior_ring_count(), 0);
    }

    #[test]
    fn overlapping_polygons_dissolve_into_one() {
        let a = square(-84.5, 38.0, 0.5);
        let b = square(-84.25, 38.0, 0.5);
        let merged = merge_group(
            "high",
            &info("a"),
            &[area("a", "high", a.clone()), area("a", "high", b.clone())],
            &MergeTolerances::default(),
        )
        .unwrap();

        let merged_area = area_of(&merged);
        assert!(matches!(merged.geometry, GroupGeometry::Polygon(_)));
        assert!(merged_area < a.unsigned_area() + b.unsigned_area());
        assert!(merged_area > a.unsigned_area());
        assert!(merged_area > b.unsigned_area());
    }

    #[test]
    fn abutting_polygons_with_a_gap_are_bridged() {
        // 0.0005 degrees of longitude is roughly 45 m here, inside the gap buffer.
        let a = square(-84.5, 38.0, 0.5);
        let b = square(-83.9995, 38.0, 0.5);
        let merged = merge_group(
            "low",
            &info("a"),
            &[area("a", "low", a), area("a", "low", b)],
            &MergeTolerances::default(),
        )
        .unwrap();

        assert_eq!(merged.geometry.polygons().len(), 1);
        assert_eq!(merged.geometry.interior_ring_count(), 0);
    }

    #[test]
    fn disjoint_polygons_stay_separate_parts() {
        let merged = merge_group(
            "low",
            &info("a"),
            &[
                area("a", "low", square(-86.0, 38.0, 0.5)),
                area("a", "low", square(-84.0, 38.0, 0.5)),
            ],
            &MergeTolerances::default(),
        )
        .unwrap();

        assert!(matches!(merged.geometry, GroupGeometry::MultiPolygon(_)));
        assert_eq!(merged.geometry.polygons().len(), 2);
    }

    #[test]
    fn ring_of_polygons_loses_its_hole() {
        // Four strips framing an empty centre.
        let frame = vec![
            area("a", "high", rect(-85.0, 38.0, -83.5, 38.5)),
            area("a", "high", rect(-85.0, 39.0, -83.5, 39.5)),
            area("a", "high", rect(-85.0, 38.0, -84.5, 39.5)),
            area("a", "high", rect(-84.0, 38.0, -83.5, 39.5)),
        ];

        let merged = merge_group("high", &info("a"), &frame, &MergeTolerances::default()).unwrap();
        assert_eq!(merged.geometry.interior_ring_count(), 0);
        assert_eq!(merged.geometry.polygons().len(), 1);
    }

    #[test]
    fn multipolygon_input_is_exploded() {
        let multi = MultiPolygon::new(vec![square(-84.5, 38.0, 0.5), square(-84.25, 38.0, 0.5)]);
        let merged = merge_group(
            "high",
            &info("a"),
            &[AreaPolygon::new(info("a"), "high", Geometry::MultiPolygon(multi))],
            &MergeTolerances::default(),
        )
        .unwrap();
        assert_eq!(merged.geometry.polygons().len(), 1);
    }

    #[test]
    fn merge_is_idempotent() {
        let areas = vec![
            area("a", "high", square(-84.5, 38.0, 0.5)),
            area("a", "high", square(-84.25, 38.2, 0.5)),
            area("b", "high", square(-83.5, 38.0, 0.5)),
        ];
        let first = merge_all(areas.clone(), &MergeTolerances::default());
        let second = merge_all(areas, &MergeTolerances::default());
        assert_eq!(first, second);
    }

    #[test]
    fn adjacent_groups_are_merged_independently() {
        let areas = vec![
            area("a", "high", square(0.0, 0.0, 1.0)),
            area("b", "high", square(1.0, 0.0, 1.0)),
        ];
        let merged = merge_all(areas, &MergeTolerances::default());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].geometry, GroupGeometry::Polygon(square(0.0, 0.0, 1.0)));
        assert_eq!(merged[1].geometry, GroupGeometry::Polygon(square(1.0, 0.0, 1.0)));
    }

    #[test]
    fn failed_union_degrades_to_first_polygon_unmodified() {
        // The extra bottom vertex would be removed by simplification.
        let first = polygon![
            (x: -84.5, y: 38.0),
            (x: -84.25, y: 38.001),
            (x: -84.0, y: 38.0),
            (x: -84.0, y: 38.5),
            (x: -84.5, y: 38.5),
        ];
        let areas = vec![
            area("a", "high", first.clone()),
            area("a", "high", square(-84.25, 38.0, 0.5)),
        ];
        let merged = merge_group_with(
            "high",
            &info("a"),
            &areas,
            &MergeTolerances::default(),
            |_: &[Polygon<f64>]| Err(GeometryError::UnionFailed("ring self-intersects".into())),
        )
        .unwrap();

        assert_eq!(merged.tag, "high");
        assert_eq!(merged.group, info("a"));
        assert_eq!(merged.geometry, GroupGeometry::Polygon(first));
    }

    #[test]
    fn erosion_that_removes_everything_keeps_the_dilated_union() {
        // Two strips about 50 m tall cannot survive a 100 m erosion.
        let slivers = vec![
            rect(-84.5, 38.0, -84.0, 38.00045),
            rect(-84.5, 38.1, -84.0, 38.10045),
        ];
        let dissolved = dissolve_with(&slivers, 100.0, |_: &[Polygon<f64>]| {
            Ok(MultiPolygon::new(slivers.clone()))
        })
        .unwrap();

        assert_eq!(dissolved, slivers);
    }

    #[test]
    fn non_finite_vertex_does_not_abort_the_merge() {
        let broken = polygon![
            (x: -84.0, y: 38.0),
            (x: f64::NAN, y: 38.0),
            (x: -83.5, y: 38.5),
            (x: -84.0, y: 38.5),
        ];
        let merged = merge_group(
            "low",
            &info("a"),
            &[
                area("a", "low", square(-84.5, 38.0, 0.5)),
                area("a", "low", broken),
            ],
            &MergeTolerances::default(),
        );

        let merged = merged.expect("group is kept");
        assert_eq!(merged.tag, "low");
        assert_eq!(merged.group.group_id, "a");
    }
}
