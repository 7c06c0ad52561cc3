//! Core data models for split configurations and their boundaries.

use chrono::{DateTime, Utc};
use geo::Geometry;
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::geometry::{polygons_from_geojson, GroupGeometry};

/// Sector metadata as stored by the admin screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaMetadata {
    pub id: String,
    pub short: String,
    pub long: String,
    pub category: String,
    pub color: String,
    /// Altitude stratum (`high`, `low`, ...). Untagged areas are never merged.
    pub tag: Option<String>,
    /// GeoJSON FeatureCollection with the sector outline
    pub geojson: Option<serde_json::Value>,
}

/// A named staffing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Split {
    pub id: String,
    pub name: String,
    pub is_published: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Split list entry; the split named `Combined` is flagged and sorted first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitSummary {
    #[serde(flatten)]
    pub split: Split,
    pub is_special: bool,
}

impl SplitSummary {
    pub const SPECIAL_NAME: &'static str = "Combined";

    pub fn new(split: Split) -> Self {
        let is_special = split.name == Self::SPECIAL_NAME;
        Self { split, is_special }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitGroup {
    pub id: String,
    pub split_id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitGroupDetail {
    #[serde(flatten)]
    pub group: SplitGroup,
    pub areas: Vec<AreaMetadata>,
}

/// A split with its groups and their assigned areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDetail {
    #[serde(flatten)]
    pub split: Split,
    pub groups: Vec<SplitGroupDetail>,
}

impl SplitDetail {
    /// Flatten the split into merge-engine input.
    ///
    /// Areas without a tag or without geometry contribute nothing. Areas whose
    /// GeoJSON cannot be parsed are skipped with a warning.
    pub fn area_polygons(&self) -> Vec<AreaPolygon> {
        let mut polygons = Vec::new();
        for detail in &self.groups {
            let info = GroupInfo::from(&detail.group);
            for area in &detail.areas {
                let (Some(tag), Some(geojson)) = (area.tag.as_deref(), area.geojson.as_ref())
                else {
                    continue;
                };
                match polygons_from_geojson(geojson) {
                    Ok(geometries) => polygons.extend(
                        geometries
                            .into_iter()
                            .map(|geometry| AreaPolygon::new(info.clone(), tag, geometry)),
                    ),
                    Err(err) => {
                        tracing::warn!(area_id = %area.id, "Skipping area geometry: {}", err);
                    }
                }
            }
        }
        polygons
    }
}

/// Payload for creating a split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSplit {
    pub name: String,
    pub groups: Vec<NewSplitGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSplitGroup {
    pub name: String,
    pub color: String,
    /// Area metadata ids assigned to this group
    pub areas: Vec<String>,
}

/// Provenance attached to every merged boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub group_id: String,
    pub group_name: String,
    pub group_color: String,
}

impl From<&SplitGroup> for GroupInfo {
    fn from(group: &SplitGroup) -> Self {
        Self {
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            group_color: group.color.clone(),
        }
    }
}

impl GroupInfo {
    pub fn to_properties(&self) -> geojson::JsonObject {
        let mut properties = geojson::JsonObject::new();
        properties.insert("groupId".into(), self.group_id.clone().into());
        properties.insert("groupName".into(), self.group_name.clone().into());
        properties.insert("groupColor".into(), self.group_color.clone().into());
        properties
    }
}

/// One polygonal geometry assigned to a group within an altitude stratum.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaPolygon {
    pub group: GroupInfo,
    pub tag: String,
    /// Polygon or MultiPolygon in WGS84 lon/lat
    pub geometry: Geometry<f64>,
}

impl AreaPolygon {
    pub fn new(group: GroupInfo, tag: impl Into<String>, geometry: Geometry<f64>) -> Self {
        Self {
            group,
            tag: tag.into(),
            geometry,
        }
    }
}

/// Serialized form of merge input, as exchanged by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaRecord {
    pub group_id: String,
    pub group_name: String,
    pub group_color: String,
    #[serde(default)]
    pub tag: Option<String>,
    /// Any GeoJSON document holding polygons
    pub geometry: serde_json::Value,
}

impl AreaRecord {
    pub fn into_polygons(self) -> Result<Vec<AreaPolygon>, GeometryError> {
        let Some(tag) = self.tag.filter(|tag| !tag.is_empty()) else {
            return Ok(Vec::new());
        };
        let group = GroupInfo {
            group_id: self.group_id,
            group_name: self.group_name,
            group_color: self.group_color,
        };
        Ok(polygons_from_geojson(&self.geometry)?
            .into_iter()
            .map(|geometry| AreaPolygon::new(group.clone(), tag.as_str(), geometry))
            .collect())
    }
}

/// Dissolved boundary of one group within one tag.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPolygon {
    pub tag: String,
    pub group: GroupInfo,
    pub geometry: GroupGeometry,
}

impl GroupPolygon {
    pub fn to_feature(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: Some(self.geometry.to_geojson()),
            id: None,
            properties: Some(self.group.to_properties()),
            foreign_members: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn area(id: &str, tag: Option<&str>, geojson: Option<serde_json::Value>) -> AreaMetadata {
        AreaMetadata {
            id: id.to_string(),
            short: id.to_string(),
            long: format!("{id} sector"),
            category: "Center".to_string(),
            color: "#ffffff".to_string(),
            tag: tag.map(str::to_string),
            geojson,
        }
    }

    fn square_collection() -> serde_json::Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                }
            }]
        })
    }

    #[test]
    fn area_polygons_skip_untagged_and_empty_areas() {
        let detail = SplitDetail {
            split: Split {
                id: "s1".to_string(),
                name: "Day".to_string(),
                is_published: true,
                is_default: false,
                created_at: Utc::now(),
            },
            groups: vec![SplitGroupDetail {
                group: SplitGroup {
                    id: "g1".to_string(),
                    split_id: "s1".to_string(),
                    name: "North".to_string(),
                    color: "#ff0000".to_string(),
                },
                areas: vec![
                    area("LOU 82", Some("high"), Some(square_collection())),
                    area("CVG 22", None, Some(square_collection())),
                    area("LEX 20", Some("low"), None),
                ],
            }],
        };

        let polygons = detail.area_polygons();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].tag, "high");
        assert_eq!(polygons[0].group.group_name, "North");
    }

    #[test]
    fn group_properties_use_camel_case_keys() {
        let info = GroupInfo {
            group_id: "g1".to_string(),
            group_name: "North".to_string(),
            group_color: "#ff0000".to_string(),
        };
        let properties = info.to_properties();
        assert_eq!(properties["groupId"], json!("g1"));
        assert_eq!(properties["groupColor"], json!("#ff0000"));
        assert_eq!(serde_json::to_value(&info).unwrap()["groupName"], json!("North"));
    }

    #[test]
    fn area_record_without_tag_yields_nothing() {
        let record = AreaRecord {
            group_id: "g1".to_string(),
            group_name: "North".to_string(),
            group_color: "#ff0000".to_string(),
            tag: None,
            geometry: square_collection(),
        };
        assert!(record.into_polygons().unwrap().is_empty());
    }
}
