//! Sector metadata persistence operations.

use airspace_core::AreaMetadata;
use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;

/// Load all areas ordered by id.
pub async fn list_areas(pool: &SqlitePool) -> Result<Vec<AreaMetadata>> {
    let rows = sqlx::query_as::<_, AreaRow>(
        "SELECT id, short, long, category, color, tag, geojson FROM area_metadata ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

/// Insert or replace an area's metadata and outline.
pub async fn upsert_area(pool: &SqlitePool, area: &AreaMetadata) -> Result<()> {
    let geojson = area
        .geojson
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO area_metadata (id, short, long, category, color, tag, geojson)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(id) DO UPDATE SET
            short = ?2, long = ?3, category = ?4, color = ?5, tag = ?6, geojson = ?7
        "#,
    )
    .bind(&area.id)
    .bind(&area.short)
    .bind(&area.long)
    .bind(&area.category)
    .bind(&area.color)
    .bind(&area.tag)
    .bind(&geojson)
    .execute(pool)
    .await?;

    Ok(())
}

/// Store the altitude tag and outline for an existing area.
///
/// Returns false when no area has that id.
pub async fn set_area_geometry(
    pool: &SqlitePool,
    id: &str,
    tag: &str,
    geojson: &serde_json::Value,
) -> Result<bool> {
    let result = sqlx::query("UPDATE area_metadata SET tag = ?2, geojson = ?3 WHERE id = ?1")
        .bind(id)
        .bind(tag)
        .bind(serde_json::to_string(geojson)?)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Ids from `ids` that have no area row, in input order.
pub async fn missing_area_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<String>> {
    let known: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT id FROM area_metadata")
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

    Ok(ids
        .iter()
        .filter(|id| !known.contains(*id))
        .cloned()
        .collect())
}

#[derive(sqlx::FromRow)]
struct AreaRow {
    id: String,
    short: String,
    long: String,
    category: String,
    color: String,
    tag: Option<String>,
    geojson: Option<String>,
}

impl TryFrom<AreaRow> for AreaMetadata {
    type Error = anyhow::Error;

    fn try_from(row: AreaRow) -> Result<Self> {
        let geojson = row
            .geojson
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(AreaMetadata {
            id: row.id,
            short: row.short,
            long: row.long,
            category: row.category,
            color: row.color,
            tag: row.tag,
            geojson,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;
    use serde_json::json;

    fn area(id: &str) -> AreaMetadata {
        AreaMetadata {
            id: id.to_string(),
            short: id.to_string(),
            long: format!("{id} Sector"),
            category: "Center".to_string(),
            color: "#336699".to_string(),
            tag: None,
            geojson: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_set_geometry() {
        let db = init_database(":memory:", 1).await.unwrap();
        upsert_area(db.pool(), &area("LOU 82")).await.unwrap();
        upsert_area(db.pool(), &area("CVG 22")).await.unwrap();

        let outline = json!({ "type": "FeatureCollection", "features": [] });
        assert!(set_area_geometry(db.pool(), "LOU 82", "high", &outline)
            .await
            .unwrap());
        assert!(!set_area_geometry(db.pool(), "NOPE", "high", &outline)
            .await
            .unwrap());

        let areas = list_areas(db.pool()).await.unwrap();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].id, "CVG 22");
        assert_eq!(areas[1].tag.as_deref(), Some("high"));
        assert_eq!(areas[1].geojson, Some(outline));
    }

    #[tokio::test]
    async fn reports_unknown_area_ids() {
        let db = init_database(":memory:", 1).await.unwrap();
        upsert_area(db.pool(), &area("LEX 20")).await.unwrap();

        let missing = missing_area_ids(
            db.pool(),
            &["LEX 20".to_string(), "ZZZ 99".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(missing, vec!["ZZZ 99".to_string()]);
    }
}
