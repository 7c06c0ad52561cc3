//! API routes for the airspace server.

pub mod areas;
pub mod request_id;
mod routes;
pub mod splits;

use axum::Router;

pub fn routes() -> Router<std::sync::Arc<crate::state::AppState>> {
    routes::create_router()
}
