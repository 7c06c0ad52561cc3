//! Attach sector outlines on disk to stored area metadata.
//!
//! Outlines live at `<dir>/<tag>/<area id>.geojson`; the tag of each area is
//! decided by which id list it appears in.

use anyhow::{Context, Result};
use airspace_server::persistence::areas;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

/// Which areas belong to which altitude stratum.
#[derive(Debug, Clone, Default)]
pub struct SectorTags {
    pub high: Vec<String>,
    pub low: Vec<String>,
}

impl SectorTags {
    pub fn tag_for(&self, area_id: &str) -> Option<&'static str> {
        if self.high.iter().any(|id| id == area_id) {
            Some("high")
        } else if self.low.iter().any(|id| id == area_id) {
            Some("low")
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct PopulateReport {
    pub updated: Vec<String>,
    /// Areas in neither id list
    pub untagged: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub fn outline_path(dir: &Path, tag: &str, area_id: &str) -> PathBuf {
    dir.join(tag).join(format!("{area_id}.geojson"))
}

/// Load and store the outline of every tagged area.
///
/// A missing or malformed file fails only that area.
pub async fn populate_areas(
    pool: &SqlitePool,
    dir: &Path,
    tags: &SectorTags,
) -> Result<PopulateReport> {
    let mut report = PopulateReport::default();

    for area in areas::list_areas(pool).await? {
        let Some(tag) = tags.tag_for(&area.id) else {
            report.untagged.push(area.id);
            continue;
        };

        let path = outline_path(dir, tag, &area.id);
        match read_outline(&path) {
            Ok(outline) => {
                areas::set_area_geometry(pool, &area.id, tag, &outline).await?;
                tracing::info!(area_id = %area.id, tag, "Stored outline");
                report.updated.push(area.id);
            }
            Err(err) => {
                tracing::warn!(area_id = %area.id, "Skipping area: {:#}", err);
                report.failed.push((area.id, format!("{err:#}")));
            }
        }
    }

    Ok(report)
}

fn read_outline(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
