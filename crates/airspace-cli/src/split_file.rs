//! Split one boundary FeatureCollection into a file per feature id.

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const ID_KEYS: [&str; 3] = ["ID", "Id", "id"];
const NAME_KEYS: [&str; 2] = ["name", "NAME"];

fn property_string(feature: &Feature, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| feature.property(key))
        .find_map(|value| match value {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Group features by id property.
///
/// Each output keeps the input's `crs` and is named after the first
/// feature's `name`/`NAME` property, or its id. Features without an id are
/// skipped. Keys are the output file names.
pub fn split_feature_collection(input: &FeatureCollection) -> BTreeMap<String, FeatureCollection> {
    let mut groups: BTreeMap<String, Vec<Feature>> = BTreeMap::new();
    for feature in &input.features {
        match property_string(feature, &ID_KEYS) {
            Some(id) => groups.entry(id).or_default().push(feature.clone()),
            None => tracing::warn!("Feature missing ID: {:?}", feature.properties),
        }
    }

    let crs = input
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .cloned();

    groups
        .into_iter()
        .map(|(id, features)| {
            let name = features
                .first()
                .and_then(|feature| property_string(feature, &NAME_KEYS))
                .unwrap_or_else(|| id.clone());

            let mut members = JsonObject::new();
            members.insert("name".to_string(), JsonValue::String(name));
            if let Some(crs) = &crs {
                members.insert("crs".to_string(), crs.clone());
            }

            let collection = FeatureCollection {
                bbox: None,
                features,
                foreign_members: Some(members),
            };
            (format!("{}.geojson", id.to_lowercase()), collection)
        })
        .collect()
}

/// Read `input`, split it, and write the pieces into `out_dir`.
pub fn write_split_files(input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let collection = match raw.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        _ => anyhow::bail!("{} is not a FeatureCollection", input.display()),
    };

    std::fs::create_dir_all(out_dir)?;

    let mut written = Vec::new();
    for (filename, collection) in split_feature_collection(&collection) {
        let path = out_dir.join(&filename);
        std::fs::write(&path, serde_json::to_string_pretty(&collection)?)?;
        tracing::info!("Created {} ({} features)", filename, collection.features.len());
        written.push(path);
    }
    Ok(written)
}
