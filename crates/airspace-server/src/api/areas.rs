//! Sector metadata endpoints.

use airspace_core::AreaMetadata;
use axum::{extract::State, Json};
use std::sync::Arc;

use crate::error::ApiError;
use crate::persistence::areas;
use crate::state::AppState;

/// List all areas with their tags and outlines.
pub async fn list_areas(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AreaMetadata>>, ApiError> {
    Ok(Json(areas::list_areas(state.pool()).await?))
}
