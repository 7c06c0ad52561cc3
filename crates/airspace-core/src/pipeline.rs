//! Merge, align and render a split's boundaries in one pass.

use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::align::{align_shared_boundaries, AlignReport};
use crate::export::export_crc;
use crate::merge::merge_all;
use crate::models::{AreaPolygon, GroupPolygon};
use crate::tolerances::{ExportTolerances, PipelineConfig};

/// Tags the viewer always receives, even when no group uses them.
pub const DEFAULT_TAGS: [&str; 2] = ["high", "low"];

/// Export dialects understood by the combined-boundary endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Crc,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "crc" => Ok(ExportFormat::Crc),
            other => Err(format!("unsupported export format '{other}'")),
        }
    }
}

/// Aligned group boundaries for one split.
#[derive(Debug, Clone)]
pub struct CombinedBoundaries {
    pub groups: Vec<GroupPolygon>,
    pub report: AlignReport,
}

/// Dissolve each group, then reconcile borders between neighbours.
pub fn combine(areas: Vec<AreaPolygon>, config: &PipelineConfig) -> CombinedBoundaries {
    let input_count = areas.len();
    let mut groups = merge_all(areas, &config.merge);
    let report = align_shared_boundaries(&mut groups, &config.align);
    tracing::debug!(
        polygons = input_count,
        groups = groups.len(),
        "Combined split boundaries"
    );
    CombinedBoundaries { groups, report }
}

impl CombinedBoundaries {
    pub fn tags(&self) -> BTreeSet<&str> {
        self.groups.iter().map(|group| group.tag.as_str()).collect()
    }

    /// One FeatureCollection per tag, one feature per group.
    pub fn viewer_collections(&self) -> BTreeMap<String, FeatureCollection> {
        let mut collections: BTreeMap<String, FeatureCollection> = DEFAULT_TAGS
            .iter()
            .map(|tag| (tag.to_string(), empty_collection()))
            .collect();

        for group in &self.groups {
            collections
                .entry(group.tag.clone())
                .or_insert_with(empty_collection)
                .features
                .push(group.to_feature());
        }
        collections
    }

    /// CRC export of the groups whose tag is listed; an empty list exports
    /// every tag.
    pub fn export_collection(
        &self,
        split_name: &str,
        tags: &[String],
        tolerances: &ExportTolerances,
    ) -> FeatureCollection {
        let selected: Vec<GroupPolygon> = self
            .groups
            .iter()
            .filter(|group| tags.is_empty() || tags.iter().any(|tag| *tag == group.tag))
            .cloned()
            .collect();
        export_crc(split_name, &selected, tolerances)
    }
}

fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}
