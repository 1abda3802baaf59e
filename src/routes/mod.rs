pub mod admin;
pub mod driver;
pub mod public;

use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

/// Headroom over the photo limit for the rest of the multipart body.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_photo_bytes + MULTIPART_OVERHEAD;
    Router::new()
        .merge(public::router())
        .nest(
            "/driver",
            driver::router().layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest("/admin", admin::router())
        .nest_service("/static", ServeDir::new("static"))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
