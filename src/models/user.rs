use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::models::vehicle::VehicleAssignment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UserRole {
    #[serde(rename = "admin", alias = "Admin")]
    Admin,
    #[serde(rename = "supervisor", alias = "Supervisor")]
    Supervisor,
    #[default]
    #[serde(rename = "driver", alias = "Driver")]
    Driver,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Supervisor => "supervisor",
            UserRole::Driver => "driver",
        }
    }

    pub fn can_export(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Supervisor)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "supervisor" => Ok(UserRole::Supervisor),
            "driver" => Ok(UserRole::Driver),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// What the console keeps about the signed-in user (`userData`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(deserialize_with = "crate::models::id::deserialize")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub assigned_vehicle: Option<VehicleAssignment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_accepts_numeric_ids() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id": 42, "name": "Asha", "role": "Driver"}"#).unwrap();
        assert_eq!(profile.id, "42");
        assert_eq!(profile.role, UserRole::Driver);
        assert!(profile.assigned_vehicle.is_none());
    }

    #[test]
    fn role_parsing_ignores_case() {
        assert_eq!("SUPERVISOR".parse::<UserRole>(), Ok(UserRole::Supervisor));
        assert!("mechanic".parse::<UserRole>().is_err());
    }
}
