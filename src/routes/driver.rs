use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::{Local, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::{
    auth,
    error::AppError,
    models::{
        photo::PhotoUpload,
        session::ActiveSession,
        ticket::{Ticket, TicketDraft, TicketErrors},
        trip::{format_elapsed, TripError, TripState, VehicleVerification},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/vehicle/scan", post(scan_vehicle))
        .route("/vehicle/assigned", post(use_assigned_vehicle))
        .route("/start-km", post(record_start_km))
        .route("/clock-in", post(clock_in))
        .route("/end-km", post(record_end_km))
        .route("/clock-out", post(clock_out))
        .route("/reset", post(reset))
        .route("/tickets", get(ticket_form).post(ticket_submit))
}

#[derive(Template)]
#[template(path = "driver/dashboard.html")]
struct DashboardTemplate {
    driver_name: String,
    step: &'static str,
    vehicle_no: String,
    verification: &'static str,
    start_km: String,
    end_km: String,
    trip_id: String,
    started_at: String,
    started_at_rfc3339: String,
    elapsed: String,
    has_assigned_vehicle: bool,
    assigned_vehicle_no: String,
    show_notice: bool,
    notice_is_error: bool,
    notice: String,
}

enum Notice {
    Info(&'static str),
    Error(String),
}

fn step_key(state: &TripState) -> &'static str {
    match state {
        TripState::Idle => "idle",
        TripState::VehicleIdentified { .. } => "vehicle_identified",
        TripState::StartKmRecorded { .. } => "start_km_recorded",
        TripState::ClockedIn { .. } => "clocked_in",
        TripState::EndKmRecorded { .. } => "end_km_recorded",
    }
}

fn notice_text(code: &str) -> Option<&'static str> {
    Some(match code {
        "vehicle_confirmed" => "Vehicle confirmed. Enter the start odometer reading.",
        "vehicle_selected" => "Using your assigned vehicle. Enter the start odometer reading.",
        "start_km_saved" => "Start reading saved. Add an odometer photo to clock in.",
        "clocked_in" => "You are clocked in. Drive safe!",
        "end_km_saved" => "End reading saved. Add an odometer photo to clock out.",
        "clocked_out" => "Trip closed. You are clocked out.",
        "reset" => "Unsaved trip details cleared.",
        "ticket_raised" => "Ticket raised. A supervisor will follow up.",
        _ => return None,
    })
}

fn render_dashboard(
    session: &ActiveSession,
    trip_state: &TripState,
    notice: Option<Notice>,
    status: StatusCode,
) -> Response {
    let assigned = session.profile.assigned_vehicle.as_ref();
    let mut view = DashboardTemplate {
        driver_name: session.profile.name.clone(),
        step: step_key(trip_state),
        vehicle_no: String::new(),
        verification: "",
        start_km: String::new(),
        end_km: String::new(),
        trip_id: String::new(),
        started_at: String::new(),
        started_at_rfc3339: String::new(),
        elapsed: String::new(),
        has_assigned_vehicle: assigned.is_some(),
        assigned_vehicle_no: assigned.map(|v| v.vehicle_no.clone()).unwrap_or_default(),
        show_notice: notice.is_some(),
        notice_is_error: matches!(notice, Some(Notice::Error(_))),
        notice: match notice {
            Some(Notice::Info(text)) => text.to_string(),
            Some(Notice::Error(text)) => text,
            None => String::new(),
        },
    };

    match trip_state {
        TripState::Idle => {}
        TripState::VehicleIdentified {
            vehicle,
            verification,
        }
        | TripState::StartKmRecorded {
            vehicle,
            verification,
            ..
        } => {
            view.vehicle_no = vehicle.vehicle_no.clone();
            view.verification = match verification {
                VehicleVerification::Scanned => "verified by QR scan",
                VehicleVerification::Assigned => "assigned vehicle",
            };
            if let TripState::StartKmRecorded { start_km, .. } = trip_state {
                view.start_km = start_km.as_str().to_string();
            }
        }
        TripState::ClockedIn { trip } | TripState::EndKmRecorded { trip, .. } => {
            view.vehicle_no = trip.vehicle_no.clone();
            view.trip_id = trip.trip_id.clone();
            view.start_km = trip.start_km.as_str().to_string();
            view.started_at = trip
                .start_time
                .with_timezone(&Local)
                .format("%d.%m.%Y %H:%M")
                .to_string();
            view.started_at_rfc3339 = trip.start_time.to_rfc3339();
            view.elapsed = format_elapsed(trip.elapsed(Utc::now()));
            if let TripState::EndKmRecorded { end_km, .. } = trip_state {
                view.end_km = end_km.as_str().to_string();
            }
        }
    }

    (status, AskamaTemplateResponse::into_response(view)).into_response()
}

#[derive(Deserialize)]
struct NoticeQuery {
    notice: Option<String>,
}

async fn dashboard(
    State(state): State<AppState>,
    session: ActiveSession,
    Query(query): Query<NoticeQuery>,
) -> Result<Response, AppError> {
    session.require_driver()?;
    let trip_state = state.trips.current(session.driver_id()).await?;
    let notice = query
        .notice
        .as_deref()
        .and_then(notice_text)
        .map(Notice::Info);
    Ok(render_dashboard(&session, &trip_state, notice, StatusCode::OK))
}

/// Redirect on success, re-render with the error as a notice when the driver
/// can fix it.
async fn respond<T>(
    state: &AppState,
    session: &ActiveSession,
    result: Result<T, AppError>,
    notice_code: &str,
) -> Result<Response, AppError> {
    match auth::expire_on_unauthorized(&state.db, session, result).await {
        Ok(_) => Ok(Redirect::to(&format!("/driver?notice={notice_code}")).into_response()),
        Err(err) if err.is_user_facing() => {
            warn!(driver = %session.driver_id(), error = %err, "driver action rejected");
            let trip_state = state.trips.current(session.driver_id()).await?;
            Ok(render_dashboard(
                session,
                &trip_state,
                Some(Notice::Error(err.notice())),
                err.status_code(),
            ))
        }
        Err(err) => Err(err),
    }
}

#[derive(Deserialize)]
struct ScanForm {
    qr_payload: String,
}

async fn scan_vehicle(
    State(state): State<AppState>,
    session: ActiveSession,
    Form(form): Form<ScanForm>,
) -> Result<Response, AppError> {
    session.require_driver()?;
    let result = state.trips.scan_vehicle(&session, &form.qr_payload).await;
    respond(&state, &session, result, "vehicle_confirmed").await
}

async fn use_assigned_vehicle(
    State(state): State<AppState>,
    session: ActiveSession,
) -> Result<Response, AppError> {
    session.require_driver()?;
    let result = state.trips.use_assigned_vehicle(&session).await;
    respond(&state, &session, result, "vehicle_selected").await
}

#[derive(Deserialize)]
struct KmForm {
    km: String,
}

async fn record_start_km(
    State(state): State<AppState>,
    session: ActiveSession,
    Form(form): Form<KmForm>,
) -> Result<Response, AppError> {
    session.require_driver()?;
    let result = state.trips.record_start_km(&session, &form.km).await;
    respond(&state, &session, result, "start_km_saved").await
}

async fn record_end_km(
    State(state): State<AppState>,
    session: ActiveSession,
    Form(form): Form<KmForm>,
) -> Result<Response, AppError> {
    session.require_driver()?;
    let result = state.trips.record_end_km(&session, &form.km).await;
    respond(&state, &session, result, "end_km_saved").await
}

/// Pulls the `photo` field out of a clock-in/out form.
async fn read_photo(mut multipart: Multipart) -> Result<PhotoUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("could not read upload: {err}")))?
    {
        if field.name() != Some("photo") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("photo").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(format!("could not read photo: {err}")))?;
        return Ok(PhotoUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(TripError::InvalidPhoto("a photo is required".into()).into())
}

async fn clock_in(
    State(state): State<AppState>,
    session: ActiveSession,
    multipart: Multipart,
) -> Result<Response, AppError> {
    session.require_driver()?;
    let result = match read_photo(multipart).await {
        Ok(photo) => state.trips.clock_in(&session, photo).await,
        Err(err) => Err(err),
    };
    respond(&state, &session, result, "clocked_in").await
}

async fn clock_out(
    State(state): State<AppState>,
    session: ActiveSession,
    multipart: Multipart,
) -> Result<Response, AppError> {
    session.require_driver()?;
    let result = match read_photo(multipart).await {
        Ok(photo) => state.trips.clock_out(&session, photo).await,
        Err(err) => Err(err),
    };
    respond(&state, &session, result, "clocked_out").await
}

async fn reset(
    State(state): State<AppState>,
    session: ActiveSession,
) -> Result<Response, AppError> {
    session.require_driver()?;
    let result = state.trips.reset(&session).await;
    respond(&state, &session, result, "reset").await
}

#[derive(Template, Default)]
#[template(path = "driver/ticket.html")]
struct TicketTemplate {
    subject: String,
    category: String,
    description: String,
    subject_error: String,
    category_error: String,
    description_error: String,
    show_error: bool,
    error_message: String,
}

impl TicketTemplate {
    fn with_errors(form: TicketForm, errors: TicketErrors) -> Self {
        Self {
            subject: form.subject,
            category: form.category,
            description: form.description,
            subject_error: errors.subject.unwrap_or_default(),
            category_error: errors.category.unwrap_or_default(),
            description_error: errors.description.unwrap_or_default(),
            ..Self::default()
        }
    }
}

async fn ticket_form(session: ActiveSession) -> Result<impl IntoResponse, AppError> {
    session.require_driver()?;
    Ok(AskamaTemplateResponse::into_response(TicketTemplate {
        category: "vehicle".into(),
        ..TicketTemplate::default()
    }))
}

#[derive(Deserialize)]
struct TicketForm {
    subject: String,
    category: String,
    description: String,
}

async fn ticket_submit(
    State(state): State<AppState>,
    session: ActiveSession,
    Form(form): Form<TicketForm>,
) -> Result<Response, AppError> {
    session.require_driver()?;
    let draft = TicketDraft {
        subject: &form.subject,
        category: &form.category,
        description: &form.description,
    };
    let (subject, category, description) = match draft.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                AskamaTemplateResponse::into_response(TicketTemplate::with_errors(form, errors)),
            )
                .into_response())
        }
    };

    let trip_state = state.trips.current(session.driver_id()).await?;
    let ticket = Ticket {
        driver_id: session.driver_id().to_string(),
        subject,
        category,
        description,
        trip_id: trip_state.trip().map(|trip| trip.trip_id.clone()),
        vehicle_id: trip_state
            .trip()
            .map(|trip| trip.vehicle_id.clone())
            .or_else(|| trip_state.vehicle().map(|v| v.vehicle_id.clone())),
    };

    let result = state.api.raise_ticket(&session.token, &ticket).await;
    match auth::expire_on_unauthorized(&state.db, &session, result).await {
        Ok(()) => Ok(Redirect::to("/driver?notice=ticket_raised").into_response()),
        Err(err) if err.is_user_facing() => {
            warn!(driver = %session.driver_id(), error = %err, "ticket rejected");
            let mut view = TicketTemplate::with_errors(form, TicketErrors::default());
            view.show_error = true;
            view.error_message = err.notice();
            Ok((err.status_code(), AskamaTemplateResponse::into_response(view)).into_response())
        }
        Err(err) => Err(err),
    }
}
