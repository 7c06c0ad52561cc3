//! Shared-boundary aligner.
//!
//! Groups are merged independently, so two neighbours rarely describe their
//! common border with the same coordinates. This pass finds edges that run
//! along a neighbour's outline and rewrites both sides onto one canonical set
//! of points, removing double lines and slivers from the combined render.

use geo::{Coord, Intersects, LineString, MultiPolygon};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

use crate::geometry::{buffer_line, contain_panic, point_within};
use crate::models::GroupPolygon;
use crate::spatial::{distance_m, midpoint};
use crate::tolerances::AlignTolerances;

const KEY_SCALE: f64 = 1e7;

/// Order-independent key of a shared segment, quantised to roughly 1 cm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentKey([i64; 4]);

impl SegmentKey {
    pub fn new(a: Coord, b: Coord) -> Self {
        let qa = quantise(a);
        let qb = quantise(b);
        let (lo, hi) = if qa <= qb { (qa, qb) } else { (qb, qa) };
        Self([lo.0, lo.1, hi.0, hi.1])
    }
}

fn quantise(coord: Coord) -> (i64, i64) {
    (
        (coord.x * KEY_SCALE).round() as i64,
        (coord.y * KEY_SCALE).round() as i64,
    )
}

/// Canonical coordinates for an edge common to two groups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedBoundarySegment {
    pub start: Coord,
    pub end: Coord,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignReport {
    pub pairs_compared: usize,
    pub pairs_sharing: usize,
    pub segments_recorded: usize,
    pub edges_rewritten: usize,
}

#[derive(Debug, Default)]
struct SharedBoundaries {
    segments: BTreeMap<SegmentKey, SharedBoundarySegment>,
    points: Vec<Coord>,
}

impl SharedBoundaries {
    /// Reuse an already-recorded point within `radius_m`, so a corner shared
    /// by three groups resolves to one coordinate.
    fn canonical_point(&mut self, candidate: Coord, radius_m: f64) -> Coord {
        let nearest = self
            .points
            .iter()
            .map(|point| (distance_m(*point, candidate), *point))
            .filter(|(distance, _)| *distance <= radius_m)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match nearest {
            Some((_, point)) => point,
            None => {
                self.points.push(candidate);
                candidate
            }
        }
    }

    fn record(&mut self, start: Coord, end: Coord, radius_m: f64) {
        let start = self.canonical_point(start, radius_m);
        let end = self.canonical_point(end, radius_m);
        if start == end {
            return;
        }
        self.segments
            .entry(SegmentKey::new(start, end))
            .or_insert(SharedBoundarySegment { start, end });
    }

    /// Canonical points for edge `p -> q`, oriented like the edge.
    fn match_edge(&self, p: Coord, q: Coord, snap_m: f64) -> Option<(Coord, Coord)> {
        let mut best: Option<(f64, Coord, Coord)> = None;
        for segment in self.segments.values() {
            for (s, e) in [(segment.start, segment.end), (segment.end, segment.start)] {
                let dp = distance_m(p, s);
                let dq = distance_m(q, e);
                if dp > snap_m || dq > snap_m {
                    continue;
                }
                let total = dp + dq;
                if best.map_or(true, |(current, _, _)| total < current) {
                    best = Some((total, s, e));
                }
            }
        }
        best.map(|(_, s, e)| (s, e))
    }
}

/// Outer rings of one group and the corridor buffered around each of them.
struct PreparedGroup {
    rings: Vec<LineString<f64>>,
    corridors: Vec<MultiPolygon<f64>>,
}

impl PreparedGroup {
    fn new(group: &GroupPolygon, line_buffer_m: f64) -> Self {
        let rings: Vec<LineString<f64>> =
            group.geometry.outer_rings().into_iter().cloned().collect();
        // An empty corridor matches nothing, so the ring is left as drawn.
        let corridors = rings
            .iter()
            .map(|ring| {
                contain_panic(|| buffer_line(ring, line_buffer_m)).unwrap_or_else(|reason| {
                    warn!(group_id = %group.group.group_id, "Corridor buffer failed: {}", reason);
                    MultiPolygon::new(Vec::new())
                })
            })
            .collect();
        Self { rings, corridors }
    }
}

/// Snap borders shared by groups of the same tag onto identical coordinates.
///
/// Pairs without a common border are left alone; that is the normal case
/// for groups on opposite sides of the facility.
pub fn align_shared_boundaries(
    groups: &mut [GroupPolygon],
    tolerances: &AlignTolerances,
) -> AlignReport {
    let mut report = AlignReport::default();
    let prepared: Vec<PreparedGroup> = groups
        .iter()
        .map(|group| PreparedGroup::new(group, tolerances.line_buffer_m))
        .collect();

    let mut shared = SharedBoundaries::default();
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            if groups[i].tag != groups[j].tag {
                continue;
            }
            report.pairs_compared += 1;
            let matched = record_pair(&prepared[i], &prepared[j], tolerances, &mut shared);
            if matched > 0 {
                report.pairs_sharing += 1;
            } else {
                trace!(
                    a = %groups[i].group.group_id,
                    b = %groups[j].group.group_id,
                    "No shared boundary"
                );
            }
        }
    }

    report.segments_recorded = shared.segments.len();
    if shared.segments.is_empty() {
        return report;
    }

    for group in groups.iter_mut() {
        let mut rings = Vec::new();
        for ring in group.geometry.outer_rings() {
            let (rewritten, count) = rewrite_ring(ring, &shared, tolerances.snap_distance_m);
            report.edges_rewritten += count;
            rings.push(rewritten);
        }
        group.geometry.set_outer_rings(rings);
    }

    debug!(
        pairs = report.pairs_compared,
        sharing = report.pairs_sharing,
        segments = report.segments_recorded,
        rewritten = report.edges_rewritten,
        "Aligned shared boundaries"
    );
    report
}

/// Record every edge of `a` that runs along `b`. Returns the matched edge count.
fn record_pair(
    a: &PreparedGroup,
    b: &PreparedGroup,
    tolerances: &AlignTolerances,
    shared: &mut SharedBoundaries,
) -> usize {
    let snap_m = tolerances.snap_distance_m;
    let mut matched = 0;

    for (ring_a, corridor_a) in a.rings.iter().zip(&a.corridors) {
        for (ring_b, corridor_b) in b.rings.iter().zip(&b.corridors) {
            if !corridor_a.intersects(corridor_b) {
                continue;
            }
            for edge in ring_a.lines() {
                if !point_within(corridor_b, edge.start) || !point_within(corridor_b, edge.end) {
                    continue;
                }
                let Some((b_start, b_end)) = closest_edge(ring_b, edge.start, edge.end) else {
                    continue;
                };
                if distance_m(edge.start, b_start) > snap_m || distance_m(edge.end, b_end) > snap_m
                {
                    continue;
                }
                // Half the snap radius keeps every rewritten vertex within
                // `snap_m` of its canonical point.
                shared.record(
                    midpoint(edge.start, b_start),
                    midpoint(edge.end, b_end),
                    snap_m / 2.0,
                );
                matched += 1;
            }
        }
    }
    matched
}

/// Edge of `ring` closest to `p -> q` by summed endpoint distance, oriented
/// so the first coordinate pairs with `p`.
fn closest_edge(ring: &LineString<f64>, p: Coord, q: Coord) -> Option<(Coord, Coord)> {
    let mut best: Option<(f64, Coord, Coord)> = None;
    for line in ring.lines() {
        let direct = distance_m(p, line.start) + distance_m(q, line.end);
        let swapped = distance_m(p, line.end) + distance_m(q, line.start);
        let candidate = if direct <= swapped {
            (direct, line.start, line.end)
        } else {
            (swapped, line.end, line.start)
        };
        if best.map_or(true, |(current, _, _)| candidate.0 < current) {
            best = Some(candidate);
        }
    }
    best.map(|(_, s, e)| (s, e))
}

/// Substitute canonical points for every edge that matches a shared segment.
fn rewrite_ring(
    ring: &LineString<f64>,
    shared: &SharedBoundaries,
    snap_m: f64,
) -> (LineString<f64>, usize) {
    let coords = &ring.0;
    if coords.len() < 4 {
        return (ring.clone(), 0);
    }

    let n = coords.len() - 1;
    let mut replaced: Vec<Option<Coord>> = vec![None; n];
    let mut rewritten = 0;
    for i in 0..n {
        if let Some((s, e)) = shared.match_edge(coords[i], coords[i + 1], snap_m) {
            replaced[i].get_or_insert(s);
            replaced[(i + 1) % n].get_or_insert(e);
            rewritten += 1;
        }
    }
    if rewritten == 0 {
        return (ring.clone(), 0);
    }

    let mut out: Vec<Coord> = Vec::with_capacity(n + 1);
    for (i, original) in coords.iter().take(n).enumerate() {
        let coord = replaced[i].unwrap_or(*original);
        if out.last() != Some(&coord) {
            out.push(coord);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    if out.len() < 3 {
        return (ring.clone(), 0);
    }
    out.push(out[0]);
    (LineString::new(out), rewritten)
}
