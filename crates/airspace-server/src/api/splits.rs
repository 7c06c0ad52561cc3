//! Split endpoints, including the combined-boundary view and CRC export.

use airspace_core::{ExportFormat, NewSplit, SplitDetail, SplitSummary};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::persistence::{areas, splits};
use crate::state::AppState;

/// List splits, `Combined` first.
pub async fn list_splits(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SplitSummary>>, ApiError> {
    Ok(Json(splits::list_splits(state.pool()).await?))
}

/// Get one split with its groups and areas.
pub async fn get_split(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SplitDetail>, ApiError> {
    splits::load_split(state.pool(), &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Split not found".to_string()))
}

/// Create a split from named groups of area ids.
pub async fn create_split(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSplit>,
) -> Result<(StatusCode, Json<SplitDetail>), ApiError> {
    validate_split(&state, &req).await?;

    let id = splits::create_split(state.pool(), &req).await?;
    let detail = load_or_missing(&state, &id).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Rename a split and replace its groups.
pub async fn update_split(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<NewSplit>,
) -> Result<Json<SplitDetail>, ApiError> {
    validate_split(&state, &req).await?;

    if !splits::update_split(state.pool(), &id, &req).await? {
        return Err(ApiError::NotFound("Split not found".to_string()));
    }
    state.invalidate_split(&id);
    Ok(Json(load_or_missing(&state, &id).await?))
}

pub async fn delete_split(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !splits::delete_split(state.pool(), &id).await? {
        return Err(ApiError::NotFound("Split not found".to_string()));
    }
    state.invalidate_split(&id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub publish: bool,
}

pub async fn set_published(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<SplitDetail>, ApiError> {
    if !splits::set_published(state.pool(), &id, req.publish).await? {
        return Err(ApiError::NotFound("Split not found".to_string()));
    }
    state.invalidate_split(&id);
    Ok(Json(load_or_missing(&state, &id).await?))
}

/// Make a split the default one; the previous default is cleared.
pub async fn make_default(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SplitDetail>, ApiError> {
    if !splits::make_default(state.pool(), &id).await? {
        return Err(ApiError::NotFound("Split not found".to_string()));
    }
    state.invalidate_split(&id);
    Ok(Json(load_or_missing(&state, &id).await?))
}

/// Reject blank names, empty group lists and unknown area ids.
async fn validate_split(state: &AppState, req: &NewSplit) -> Result<(), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Split name is required".to_string()));
    }
    if req.groups.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one group is required".to_string(),
        ));
    }

    let requested: Vec<String> = req
        .groups
        .iter()
        .flat_map(|group| group.areas.iter().cloned())
        .collect();
    let missing = areas::missing_area_ids(state.pool(), &requested).await?;
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Unknown areas: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

async fn load_or_missing(state: &AppState, id: &str) -> Result<SplitDetail, ApiError> {
    splits::load_split(state.pool(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Split not found".to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub struct CombinedQuery {
    pub export: Option<String>,
    /// Comma-separated tags to export; all tags when absent
    pub tags: Option<String>,
}

impl CombinedQuery {
    fn format(&self) -> Result<Option<ExportFormat>, ApiError> {
        self.export
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::parse::<ExportFormat>)
            .transpose()
            .map_err(ApiError::BadRequest)
    }

    fn tags(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Merged group boundaries for a split.
///
/// Without `export`, responds with one FeatureCollection per tag. With
/// `export=crc`, responds with the CRC line export of the selected tags.
pub async fn get_combined(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<CombinedQuery>,
) -> Result<Response, ApiError> {
    let format = query.format()?;
    let combined = state.combined_split(&id).await?;

    let response = match format {
        None => Json(combined.boundaries.viewer_collections()).into_response(),
        Some(ExportFormat::Crc) => {
            let tags = query.tags();
            tracing::debug!(split_id = %id, ?tags, "Exporting CRC boundaries");
            Json(combined.boundaries.export_collection(
                &combined.name,
                &tags,
                &state.pipeline().export,
            ))
            .into_response()
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_split_and_trimmed() {
        let query = CombinedQuery {
            export: Some("crc".to_string()),
            tags: Some(" high, ,low ".to_string()),
        };
        assert_eq!(query.tags(), vec!["high".to_string(), "low".to_string()]);
        assert_eq!(query.format(), Ok(Some(ExportFormat::Crc)));
        assert!(CombinedQuery::default().tags().is_empty());
    }

    #[test]
    fn unknown_export_is_a_bad_request() {
        let query = CombinedQuery {
            export: Some("kml".to_string()),
            tags: None,
        };
        assert!(matches!(query.format(), Err(ApiError::BadRequest(_))));
        assert_eq!(CombinedQuery::default().format(), Ok(None));
    }
}
