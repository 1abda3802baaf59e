use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::user::{UserProfile, UserRole};

/// Stored console session. Holds what the browser app used to keep under
/// `token`, `userRole`, `userData` and `isLoggedIn`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub token: Option<String>,
    pub user_role: String,
    pub user_data: String,
    pub is_logged_in: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// A session that passed the expiry guard.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub session_id: String,
    pub token: String,
    pub role: UserRole,
    pub profile: UserProfile,
}

impl ActiveSession {
    pub fn driver_id(&self) -> &str {
        &self.profile.id
    }
}
