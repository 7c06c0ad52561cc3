//! Offline combine/export over a JSON file of area records.

use airspace_core::{combine, AreaPolygon, AreaRecord, ExportFormat, PipelineConfig};
use anyhow::{Context, Result};
use std::path::Path;

/// Read a JSON array of area records and convert them to merge input.
pub fn load_records(path: &Path) -> Result<Vec<AreaPolygon>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let records: Vec<AreaRecord> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;

    let mut polygons = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        let group_id = record.group_id.clone();
        polygons.extend(
            record
                .into_polygons()
                .with_context(|| format!("record {index} (group {group_id})"))?,
        );
    }
    Ok(polygons)
}

/// Run the pipeline and render either the viewer map or an export.
pub fn combine_records(
    areas: Vec<AreaPolygon>,
    config: &PipelineConfig,
    export: Option<ExportFormat>,
    split_name: &str,
    tags: &[String],
) -> Result<serde_json::Value> {
    let combined = combine(areas, config);
    tracing::info!(
        groups = combined.groups.len(),
        edges_rewritten = combined.report.edges_rewritten,
        "Combined boundaries"
    );

    let rendered = match export {
        None => serde_json::to_value(combined.viewer_collections())?,
        Some(ExportFormat::Crc) => serde_json::to_value(combined.export_collection(
            split_name,
            tags,
            &config.export,
        ))?,
    };
    Ok(rendered)
}
