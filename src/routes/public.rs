use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use tracing::warn;

use crate::{
    auth,
    error::AppError,
    models::{session::ActiveSession, user::UserRole},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", post(logout))
}

async fn landing(session: Option<ActiveSession>) -> Redirect {
    match session {
        Some(session) if session.role == UserRole::Driver => Redirect::to("/driver"),
        Some(_) => Redirect::to("/admin"),
        None => Redirect::to("/login"),
    }
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    expired: bool,
    show_error: bool,
    error_message: String,
    username: String,
}

#[derive(Deserialize)]
struct LoginQuery {
    expired: Option<String>,
}

async fn login_form(Query(query): Query<LoginQuery>) -> impl IntoResponse {
    AskamaTemplateResponse::into_response(LoginTemplate {
        expired: query.expired.is_some(),
        show_error: false,
        error_message: String::new(),
        username: String::new(),
    })
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match auth::login(&state, &form.username, &form.password).await {
        Ok(session_id) => Ok((
            auth::apply_session_cookie(jar, &session_id),
            Redirect::to("/"),
        )
            .into_response()),
        Err(AppError::Unauthorized) => Ok(render_login_error(
            form.username,
            "Login failed. Check your username and password.".into(),
        )),
        Err(err) if err.is_user_facing() => {
            warn!(error = %err, "login rejected");
            Ok(render_login_error(form.username, err.notice()))
        }
        Err(err) => Err(err),
    }
}

fn render_login_error(username: String, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(LoginTemplate {
            expired: false,
            show_error: true,
            error_message: message,
            username,
        }),
    )
        .into_response()
}

async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        auth::destroy_session(&state.db, cookie.value()).await?;
    }
    Ok((auth::clear_session_cookie(jar), Redirect::to("/login")))
}
