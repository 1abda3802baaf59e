use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use thiserror::Error;

use crate::{auth::SESSION_COOKIE, models::trip::TripError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error(transparent)]
    Trip(#[from] TripError),
    #[error("backend responded with {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("{0}")]
    BadRequest(String),
    #[error("session expired")]
    SessionExpired,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
}

impl AppError {
    /// Errors the driver can act on; these are shown as a notice instead of
    /// failing the request.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AppError::Trip(_)
                | AppError::BadRequest(_)
                | AppError::Upstream { .. }
                | AppError::Http(_)
        )
    }

    /// Text shown to the user. Transport failures hide the reqwest detail.
    pub fn notice(&self) -> String {
        match self {
            AppError::Http(_) => "Could not reach the server, try again.".into(),
            other => other.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::SessionExpired | AppError::Unauthorized => StatusCode::SEE_OTHER,
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Http(_) | AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Trip(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let target = match self {
            AppError::SessionExpired => "/login?expired=1",
            AppError::Unauthorized => "/login",
            _ => return (self.status_code(), self.notice()).into_response(),
        };
        let jar = CookieJar::new().remove(Cookie::build(SESSION_COOKIE).path("/"));
        (jar, Redirect::to(target)).into_response()
    }
}
