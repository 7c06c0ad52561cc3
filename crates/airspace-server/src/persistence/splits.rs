//! Split persistence operations.

use airspace_core::{
    AreaMetadata, AreaPolygon, NewSplit, Split, SplitDetail, SplitGroup, SplitGroupDetail,
    SplitSummary,
};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// All splits, the `Combined` split first and the rest newest first.
pub async fn list_splits(pool: &SqlitePool) -> Result<Vec<SplitSummary>> {
    let rows = sqlx::query_as::<_, SplitRow>(
        r#"
        SELECT id, name, is_published, is_default, created_at
        FROM splits
        ORDER BY CASE WHEN name = ?1 THEN 0 ELSE 1 END, created_at DESC
        "#,
    )
    .bind(SplitSummary::SPECIAL_NAME)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| SplitSummary::new(row.into()))
        .collect())
}

/// Flat join of a split with its groups and their areas.
///
/// Empty when the split does not exist. A split without groups yields one row
/// with no group columns.
pub async fn load_split_rows(pool: &SqlitePool, split_id: &str) -> Result<Vec<SplitJoinRow>> {
    let rows = sqlx::query_as::<_, SplitJoinRow>(
        r#"
        SELECT
            s.id AS split_id, s.name AS split_name, s.is_published, s.is_default,
            s.created_at AS split_created_at,
            g.id AS group_id, g.name AS group_name, g.color AS group_color,
            a.id AS area_id, a.short AS area_short, a.long AS area_long,
            a.category AS area_category, a.color AS area_color,
            a.tag AS area_tag, a.geojson AS area_geojson
        FROM splits s
        LEFT JOIN split_groups g ON g.split_id = s.id
        LEFT JOIN split_group_areas ga ON ga.group_id = g.id
        LEFT JOIN area_metadata a ON a.id = ga.area_id
        WHERE s.id = ?1
        ORDER BY g.rowid, ga.rowid
        "#,
    )
    .bind(split_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fold join rows into the nested split, keeping first-seen order.
pub fn assemble_split(rows: Vec<SplitJoinRow>) -> Option<SplitDetail> {
    let first = rows.first()?;
    let split = Split {
        id: first.split_id.clone(),
        name: first.split_name.clone(),
        is_published: first.is_published,
        is_default: first.is_default,
        created_at: parse_timestamp(&first.split_created_at),
    };

    let mut groups: Vec<SplitGroupDetail> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut seen_areas: HashSet<(String, String)> = HashSet::new();

    for row in rows {
        let Some(group_id) = row.group_id else {
            continue;
        };

        let index = match group_index.get(&group_id) {
            Some(index) => *index,
            None => {
                groups.push(SplitGroupDetail {
                    group: SplitGroup {
                        id: group_id.clone(),
                        split_id: row.split_id.clone(),
                        name: row.group_name.unwrap_or_default(),
                        color: row.group_color.unwrap_or_default(),
                    },
                    areas: Vec::new(),
                });
                group_index.insert(group_id.clone(), groups.len() - 1);
                groups.len() - 1
            }
        };

        let Some(area_id) = row.area_id else {
            continue;
        };
        if !seen_areas.insert((group_id, area_id.clone())) {
            continue;
        }

        let geojson = row.area_geojson.as_deref().and_then(|raw| {
            serde_json::from_str(raw)
                .map_err(|err| tracing::warn!(area_id = %area_id, "Invalid stored GeoJSON: {}", err))
                .ok()
        });

        groups[index].areas.push(AreaMetadata {
            id: area_id,
            short: row.area_short.unwrap_or_default(),
            long: row.area_long.unwrap_or_default(),
            category: row.area_category.unwrap_or_default(),
            color: row.area_color.unwrap_or_default(),
            tag: row.area_tag,
            geojson,
        });
    }

    Some(SplitDetail { split, groups })
}

/// Merge-engine input for a split.
pub fn area_polygons(detail: &SplitDetail) -> Vec<AreaPolygon> {
    let polygons = detail.area_polygons();
    tracing::debug!(
        split_id = %detail.split.id,
        polygons = polygons.len(),
        "Collected split area polygons"
    );
    polygons
}

/// Load one split with its groups and areas.
pub async fn load_split(pool: &SqlitePool, split_id: &str) -> Result<Option<SplitDetail>> {
    Ok(assemble_split(load_split_rows(pool, split_id).await?))
}

/// Insert a split, its groups and their area links in one transaction.
///
/// Returns the new split id.
pub async fn create_split(pool: &SqlitePool, split: &NewSplit) -> Result<String> {
    anyhow::ensure!(!split.groups.is_empty(), "At least one group is required");

    let split_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO splits (id, name, is_published, is_default, created_at) VALUES (?1, ?2, 0, 0, ?3)",
    )
    .bind(&split_id)
    .bind(&split.name)
    .bind(&now)
    .execute(&mut *tx)
    .await?;
    insert_groups(&mut tx, &split_id, split, &now).await?;
    tx.commit().await?;

    tracing::info!("Created split '{}' ({})", split.name, split_id);
    Ok(split_id)
}

/// Rename a split and replace all of its groups in one transaction.
///
/// Returns false when the split does not exist. Publish and default flags are
/// left as they were.
pub async fn update_split(pool: &SqlitePool, split_id: &str, split: &NewSplit) -> Result<bool> {
    anyhow::ensure!(!split.groups.is_empty(), "At least one group is required");

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    let mut tx = pool.begin().await?;
    let renamed = sqlx::query("UPDATE splits SET name = ?1 WHERE id = ?2")
        .bind(&split.name)
        .bind(split_id)
        .execute(&mut *tx)
        .await?;
    if renamed.rows_affected() == 0 {
        return Ok(false);
    }

    delete_groups(&mut tx, split_id).await?;
    insert_groups(&mut tx, split_id, split, &now).await?;
    tx.commit().await?;

    tracing::info!("Updated split '{}' ({})", split.name, split_id);
    Ok(true)
}

/// Remove a split with its groups and area links.
pub async fn delete_split(pool: &SqlitePool, split_id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;
    delete_groups(&mut tx, split_id).await?;
    let deleted = sqlx::query("DELETE FROM splits WHERE id = ?1")
        .bind(split_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let found = deleted.rows_affected() > 0;
    if found {
        tracing::info!("Deleted split {}", split_id);
    }
    Ok(found)
}

pub async fn set_published(pool: &SqlitePool, split_id: &str, published: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE splits SET is_published = ?1 WHERE id = ?2")
        .bind(published)
        .bind(split_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Make one split the default, clearing the previous default in the same
/// transaction.
pub async fn make_default(pool: &SqlitePool, split_id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE splits SET is_default = 0 WHERE is_default = 1")
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("UPDATE splits SET is_default = 1 WHERE id = ?1")
        .bind(split_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        // Dropping the transaction rolls the clear back.
        return Ok(false);
    }
    tx.commit().await?;

    tracing::info!("Split {} is now the default", split_id);
    Ok(true)
}

async fn insert_groups(
    conn: &mut SqliteConnection,
    split_id: &str,
    split: &NewSplit,
    now: &str,
) -> Result<()> {
    for group in &split.groups {
        let group_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO split_groups (id, split_id, name, color, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&group_id)
        .bind(split_id)
        .bind(&group.name)
        .bind(&group.color)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        for area_id in &group.areas {
            sqlx::query(
                "INSERT INTO split_group_areas (id, group_id, area_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&group_id)
            .bind(area_id)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

async fn delete_groups(conn: &mut SqliteConnection, split_id: &str) -> Result<()> {
    sqlx::query(
        "DELETE FROM split_group_areas WHERE group_id IN (SELECT id FROM split_groups WHERE split_id = ?1)",
    )
    .bind(split_id)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM split_groups WHERE split_id = ?1")
        .bind(split_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct SplitRow {
    id: String,
    name: String,
    is_published: bool,
    is_default: bool,
    created_at: String,
}

impl From<SplitRow> for Split {
    fn from(row: SplitRow) -> Self {
        Split {
            id: row.id,
            name: row.name,
            is_published: row.is_published,
            is_default: row.is_default,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

/// One row of the split/group/area join.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct SplitJoinRow {
    pub split_id: String,
    pub split_name: String,
    pub is_published: bool,
    pub is_default: bool,
    pub split_created_at: String,
    pub group_id: Option<String>,
    pub group_name: Option<String>,
    pub group_color: Option<String>,
    pub area_id: Option<String>,
    pub area_short: Option<String>,
    pub area_long: Option<String>,
    pub area_category: Option<String>,
    pub area_color: Option<String>,
    pub area_tag: Option<String>,
    pub area_geojson: Option<String>,
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{areas, init_database};
    use airspace_core::NewSplitGroup;
    use serde_json::json;

    fn row(group: Option<&str>, area: Option<&str>) -> SplitJoinRow {
        SplitJoinRow {
            split_id: "s1".to_string(),
            split_name: "Day".to_string(),
            is_published: true,
            split_created_at: "2024-05-01T12:00:00Z".to_string(),
            group_id: group.map(str::to_string),
            group_name: group.map(|g| format!("Group {g}")),
            group_color: group.map(|_| "#ff0000".to_string()),
            area_id: area.map(str::to_string),
            area_short: area.map(str::to_string),
            area_tag: area.map(|_| "high".to_string()),
            area_geojson: area.map(|_| r#"{"type":"FeatureCollection","features":[]}"#.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn assemble_groups_rows_in_order() {
        let detail = assemble_split(vec![
            row(Some("g2"), Some("LOU 82")),
            row(Some("g1"), Some("CVG 22")),
            row(Some("g2"), Some("LEX 20")),
            row(Some("g2"), Some("LOU 82")),
            row(Some("g3"), None),
        ])
        .unwrap();

        assert_eq!(detail.split.name, "Day");
        let ids: Vec<&str> = detail.groups.iter().map(|g| g.group.id.as_str()).collect();
        assert_eq!(ids, vec!["g2", "g1", "g3"]);
        assert_eq!(detail.groups[0].areas.len(), 2);
        assert!(detail.groups[2].areas.is_empty());
        assert_eq!(detail.groups[0].areas[0].geojson, Some(json!({"type":"FeatureCollection","features":[]})));
    }

    #[test]
    fn assemble_handles_missing_and_groupless_splits() {
        assert!(assemble_split(Vec::new()).is_none());

        let detail = assemble_split(vec![row(None, None)]).unwrap();
        assert!(detail.groups.is_empty());
    }

    async fn seed_areas(pool: &SqlitePool, ids: &[&str]) {
        for id in ids {
            areas::upsert_area(
                pool,
                &AreaMetadata {
                    id: id.to_string(),
                    short: id.to_string(),
                    long: format!("{id} Sector"),
                    category: "Center".to_string(),
                    color: "#336699".to_string(),
                    tag: Some("high".to_string()),
                    geojson: None,
                },
            )
            .await
            .unwrap();
        }
    }

    fn new_split(name: &str, areas: &[&str]) -> NewSplit {
        NewSplit {
            name: name.to_string(),
            groups: vec![NewSplitGroup {
                name: "North".to_string(),
                color: "#ff0000".to_string(),
                areas: areas.iter().map(|a| a.to_string()).collect(),
            }],
        }
    }

    #[tokio::test]
    async fn create_and_load_split() {
        let db = init_database(":memory:", 1).await.unwrap();
        seed_areas(db.pool(), &["LOU 82", "CVG 22"]).await;

        let id = create_split(db.pool(), &new_split("Day", &["LOU 82", "CVG 22"]))
            .await
            .unwrap();
        let detail = load_split(db.pool(), &id).await.unwrap().unwrap();

        assert_eq!(detail.split.name, "Day");
        assert!(!detail.split.is_published);
        assert_eq!(detail.groups.len(), 1);
        let area_ids: Vec<&str> = detail.groups[0].areas.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(area_ids, vec!["LOU 82", "CVG 22"]);

        assert!(load_split(db.pool(), "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_split_requires_a_group() {
        let db = init_database(":memory:", 1).await.unwrap();
        let empty = NewSplit {
            name: "Empty".to_string(),
            groups: Vec::new(),
        };
        assert!(create_split(db.pool(), &empty).await.is_err());
    }

    #[tokio::test]
    async fn combined_split_is_listed_first() {
        let db = init_database(":memory:", 1).await.unwrap();
        seed_areas(db.pool(), &["LOU 82"]).await;

        create_split(db.pool(), &new_split("Combined", &["LOU 82"])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        create_split(db.pool(), &new_split("Day", &["LOU 82"])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        create_split(db.pool(), &new_split("Night", &["LOU 82"])).await.unwrap();

        let splits = list_splits(db.pool()).await.unwrap();
        let names: Vec<&str> = splits.iter().map(|s| s.split.name.as_str()).collect();
        assert_eq!(names, vec!["Combined", "Night", "Day"]);
        assert!(splits[0].is_special);
        assert!(!splits[1].is_special);
    }

    #[tokio::test]
    async fn update_replaces_groups_and_keeps_flags() {
        let db = init_database(":memory:", 1).await.unwrap();
        seed_areas(db.pool(), &["LOU 82", "CVG 22", "LEX 20"]).await;

        let id = create_split(db.pool(), &new_split("Day", &["LOU 82"])).await.unwrap();
        assert!(set_published(db.pool(), &id, true).await.unwrap());

        let mut edit = new_split("Day shift", &["CVG 22"]);
        edit.groups.push(NewSplitGroup {
            name: "South".to_string(),
            color: "#0000ff".to_string(),
            areas: vec!["LEX 20".to_string(), "LOU 82".to_string()],
        });
        assert!(update_split(db.pool(), &id, &edit).await.unwrap());

        let detail = load_split(db.pool(), &id).await.unwrap().unwrap();
        assert_eq!(detail.split.name, "Day shift");
        assert!(detail.split.is_published);
        let names: Vec<&str> = detail.groups.iter().map(|g| g.group.name.as_str()).collect();
        assert_eq!(names, vec!["North", "South"]);
        assert_eq!(detail.groups[0].areas.len(), 1);
        assert_eq!(detail.groups[0].areas[0].id, "CVG 22");
        assert_eq!(detail.groups[1].areas.len(), 2);

        assert!(!update_split(db.pool(), "missing", &edit).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_split_and_links() {
        let db = init_database(":memory:", 1).await.unwrap();
        seed_areas(db.pool(), &["LOU 82"]).await;

        let id = create_split(db.pool(), &new_split("Day", &["LOU 82"])).await.unwrap();
        assert!(delete_split(db.pool(), &id).await.unwrap());
        assert!(load_split(db.pool(), &id).await.unwrap().is_none());
        assert!(!delete_split(db.pool(), &id).await.unwrap());

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM split_group_areas")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(links, 0);
        assert_eq!(areas::list_areas(db.pool()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_one_split_is_default() {
        let db = init_database(":memory:", 1).await.unwrap();
        seed_areas(db.pool(), &["LOU 82"]).await;

        let day = create_split(db.pool(), &new_split("Day", &["LOU 82"])).await.unwrap();
        let night = create_split(db.pool(), &new_split("Night", &["LOU 82"])).await.unwrap();

        assert!(make_default(db.pool(), &day).await.unwrap());
        assert!(make_default(db.pool(), &night).await.unwrap());
        assert!(!load_split(db.pool(), &day).await.unwrap().unwrap().split.is_default);
        assert!(load_split(db.pool(), &night).await.unwrap().unwrap().split.is_default);

        // An unknown id leaves the current default in place.
        assert!(!make_default(db.pool(), "missing").await.unwrap());
        assert!(load_split(db.pool(), &night).await.unwrap().unwrap().split.is_default);
    }
}
