use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};

/// Row of `/attendees`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    #[serde(deserialize_with = "crate::models::id::deserialize")]
    pub id: String,
    pub name: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub phone: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub pickup_point: Option<String>,
}
