use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    PrivateCookieJar,
};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    guard,
    models::{
        session::{ActiveSession, Session},
        user::{UserProfile, UserRole},
    },
    services::api::LoginResponse,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "fleet_session";

/// Rows not seen for this long are deleted, expired or not.
pub const SESSION_RETENTION_DAYS: i64 = 7;

/// Log in against the backend and open a console session. Drivers get their
/// vehicle assignment fetched once here.
pub async fn login(state: &AppState, username: &str, password: &str) -> Result<String, AppError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("Username and password are required".into()));
    }

    let LoginResponse { token, role, user } = state.api.login(username, password).await?;
    if !guard::is_token_valid(&token, Utc::now()) {
        warn!(user = %username, "backend issued an unusable token");
        return Err(AppError::Unauthorized);
    }

    let mut profile = user;
    profile.role = role.unwrap_or(profile.role);
    if profile.role == UserRole::Driver && profile.assigned_vehicle.is_none() {
        profile.assigned_vehicle = state.api.assigned_vehicle(&token, &profile.id).await?;
    }

    let session_id = create_session(&state.db, &token, &profile).await?;
    info!(user = %profile.id, role = %profile.role, "logged in");
    Ok(session_id)
}

pub async fn create_session(
    db: &DbPool,
    token: &str,
    profile: &UserProfile,
) -> Result<String, AppError> {
    let id = Uuid::new_v4().to_string();
    let user_data = serde_json::to_string(profile).map_err(|err| AppError::Other(err.into()))?;
    let now = Utc::now();
    purge_stale_sessions(db, now).await?;
    sqlx::query(
        r#"INSERT INTO sessions (id, token, user_role, user_data, is_logged_in, created_at, last_seen_at)
           VALUES (?, ?, ?, ?, 1, ?, ?)"#,
    )
    .bind(&id)
    .bind(token)
    .bind(profile.role.as_str())
    .bind(user_data)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    Ok(id)
}

pub async fn purge_stale_sessions(db: &DbPool, now: DateTime<Utc>) -> Result<u64, AppError> {
    let cutoff = now - Duration::days(SESSION_RETENTION_DAYS);
    let result = sqlx::query("DELETE FROM sessions WHERE julianday(last_seen_at) < julianday(?)")
        .bind(cutoff)
        .execute(db)
        .await?;
    let purged = result.rows_affected();
    if purged > 0 {
        info!(purged, "stale sessions removed");
    }
    Ok(purged)
}

pub async fn load_session(db: &DbPool, session_id: &str) -> Result<Option<Session>, AppError> {
    let session = sqlx::query_as::<_, Session>(
        r#"SELECT id, token, user_role, user_data, is_logged_in, created_at, last_seen_at
           FROM sessions WHERE id = ?"#,
    )
    .bind(session_id)
    .fetch_optional(db)
    .await?;
    Ok(session)
}

/// Drops the stored token but keeps the row, so a stale cookie still
/// resolves to "expired" rather than "unknown".
pub async fn expire_session(db: &DbPool, session_id: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE sessions SET token = NULL, is_logged_in = 0 WHERE id = ?")
        .bind(session_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn destroy_session(db: &DbPool, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(session_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Session guard. Runs before every authenticated action.
pub async fn ensure_session(
    db: &DbPool,
    session: Session,
    now: DateTime<Utc>,
) -> Result<ActiveSession, AppError> {
    let token = match session.token {
        Some(token) if session.is_logged_in && guard::is_token_valid(&token, now) => token,
        _ => {
            expire_session(db, &session.id).await?;
            warn!(session = %session.id, "session expired");
            return Err(AppError::SessionExpired);
        }
    };

    sqlx::query("UPDATE sessions SET last_seen_at = ? WHERE id = ?")
        .bind(now)
        .bind(&session.id)
        .execute(db)
        .await?;

    let profile: UserProfile =
        serde_json::from_str(&session.user_data).map_err(|err| AppError::Other(err.into()))?;
    let role = session
        .user_role
        .parse::<UserRole>()
        .map_err(|err| AppError::Other(anyhow::anyhow!(err)))?;

    Ok(ActiveSession {
        session_id: session.id,
        token,
        role,
        profile,
    })
}

/// A 401 from the backend ends the session the same way local expiry does.
pub async fn expire_on_unauthorized<T>(
    db: &DbPool,
    session: &ActiveSession,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    if matches!(result, Err(AppError::SessionExpired)) {
        expire_session(db, &session.session_id).await?;
        warn!(session = %session.session_id, "backend ended the session");
    }
    result
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, session_id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

#[async_trait]
impl FromRequestParts<AppState> for ActiveSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
        let session_id = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or(AppError::Unauthorized)?;
        let session = load_session(&state.db, &session_id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        ensure_session(&state.db, session, Utc::now()).await
    }
}

impl ActiveSession {
    pub fn require_driver(&self) -> Result<(), AppError> {
        if self.role == UserRole::Driver {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_manager(&self) -> Result<(), AppError> {
        if self.role.can_export() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}
