use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::info;

use crate::{
    auth,
    error::AppError,
    models::session::ActiveSession,
    services::export::{to_csv, CsvRecord},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/vehicles.csv", get(export_vehicles))
        .route("/attendees.csv", get(export_attendees))
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
struct AdminDashboardTemplate {
    display_name: String,
    role: String,
}

async fn dashboard(session: ActiveSession) -> Result<impl IntoResponse, AppError> {
    session.require_manager()?;
    Ok(AskamaTemplateResponse::into_response(AdminDashboardTemplate {
        display_name: session.profile.name.clone(),
        role: session.role.to_string(),
    }))
}

fn csv_response<R: CsvRecord>(filename: &str, records: &[R]) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        to_csv(records),
    )
        .into_response()
}

async fn export_vehicles(
    State(state): State<AppState>,
    session: ActiveSession,
) -> Result<Response, AppError> {
    session.require_manager()?;
    let result = state.api.list_vehicles(&session.token).await;
    let vehicles = auth::expire_on_unauthorized(&state.db, &session, result).await?;
    info!(user = %session.profile.id, rows = vehicles.len(), "vehicle list exported");
    Ok(csv_response("vehicles.csv", &vehicles))
}

async fn export_attendees(
    State(state): State<AppState>,
    session: ActiveSession,
) -> Result<Response, AppError> {
    session.require_manager()?;
    let result = state.api.list_attendees(&session.token).await;
    let attendees = auth::expire_on_unauthorized(&state.db, &session, result).await?;
    info!(user = %session.profile.id, rows = attendees.len(), "attendee list exported");
    Ok(csv_response("attendees.csv", &attendees))
}
