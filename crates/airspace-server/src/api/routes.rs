//! REST API routes.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::{areas, request_id, splits};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/v1/areas", get(areas::list_areas))
        .route(
            "/v1/splits",
            get(splits::list_splits).post(splits::create_split),
        )
        .route(
            "/v1/splits/:id",
            get(splits::get_split)
                .put(splits::update_split)
                .delete(splits::delete_split),
        )
        .route("/v1/splits/:id/publish", post(splits::set_published))
        .route("/v1/splits/:id/default", post(splits::make_default))
        .route("/v1/splits/:id/combined", get(splits::get_combined))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id::ensure_request_id))
}
