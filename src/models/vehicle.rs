use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleAssignment {
    #[serde(deserialize_with = "crate::models::id::deserialize")]
    pub driver_id: String,
    #[serde(deserialize_with = "crate::models::id::deserialize")]
    pub vehicle_id: String,
    #[serde(deserialize_with = "crate::models::id::deserialize")]
    pub vehicle_no: String,
}

/// Row of `/vehicle_list`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[serde(deserialize_with = "crate::models::id::deserialize")]
    pub id: String,
    #[serde(deserialize_with = "crate::models::id::deserialize")]
    pub vehicle_no: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub driver_name: Option<String>,
}
