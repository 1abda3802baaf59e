use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::AppError,
    models::{
        attendee::Attendee,
        photo::PhotoUpload,
        ticket::Ticket,
        trip::Odometer,
        user::{UserProfile, UserRole},
        vehicle::{Vehicle, VehicleAssignment},
    },
};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub role: Option<UserRole>,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleValidation {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub vehicle: Option<VehicleAssignment>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockIn {
    pub driver_id: String,
    pub driver_name: String,
    pub vehicle_id: String,
    pub vehicle_no: String,
    pub start_km: Odometer,
    pub start_photo: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockOut {
    pub trip_id: String,
    pub driver_id: String,
    pub vehicle_id: String,
    pub end_km: Odometer,
    pub end_photo: String,
    pub end_time: DateTime<Utc>,
    pub total_km: f64,
}

/// Body of `POST /trip_action`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action")]
pub enum TripAction {
    #[serde(rename = "clock_in")]
    ClockIn(ClockIn),
    #[serde(rename = "clock_out")]
    ClockOut(ClockOut),
}

impl TripAction {
    pub fn name(&self) -> &'static str {
        match self {
            TripAction::ClockIn(_) => "clock_in",
            TripAction::ClockOut(_) => "clock_out",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripActionResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(
        default,
        alias = "trip_id",
        deserialize_with = "crate::models::id::deserialize_opt"
    )]
    pub trip_id: Option<String>,
}

impl TripActionResponse {
    /// Some backend handlers answer 200 with `success: false`.
    pub fn into_result(self) -> Result<Self, AppError> {
        if self.success == Some(false) {
            return Err(AppError::Upstream {
                status: StatusCode::OK.as_u16(),
                message: self
                    .message
                    .unwrap_or_else(|| "trip action was refused".into()),
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(alias = "photoUrl", alias = "photo_url")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct AssignedVehicleResponse {
    #[serde(default)]
    vehicle: Option<VehicleAssignment>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListEnvelope<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListEnvelope::Bare(items) | ListEnvelope::Wrapped { data: items } => items,
        }
    }
}

/// The transport-management REST backend.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AppError>;

    async fn assigned_vehicle(
        &self,
        token: &str,
        driver_id: &str,
    ) -> Result<Option<VehicleAssignment>, AppError>;

    async fn validate_driver_vehicle(
        &self,
        token: &str,
        driver_id: &str,
        vehicle_id: &str,
    ) -> Result<VehicleValidation, AppError>;

    /// Returns the public URL of the stored photo.
    async fn upload_trip_photo(
        &self,
        token: &str,
        driver_id: &str,
        photo: &PhotoUpload,
    ) -> Result<String, AppError>;

    async fn trip_action(
        &self,
        token: &str,
        action: &TripAction,
    ) -> Result<TripActionResponse, AppError>;

    async fn list_vehicles(&self, token: &str) -> Result<Vec<Vehicle>, AppError>;

    async fn list_attendees(&self, token: &str) -> Result<Vec<Attendee>, AppError>;

    async fn raise_ticket(&self, token: &str, ticket: &Ticket) -> Result<(), AppError>;
}

pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base: Url) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("fleet/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base
            .join(path)
            .map_err(|err| AppError::Other(err.into()))
    }

    fn get(&self, token: &str, path: &str) -> Result<RequestBuilder, AppError> {
        Ok(self.client.get(self.endpoint(path)?).bearer_auth(token))
    }

    fn post(&self, token: &str, path: &str) -> Result<RequestBuilder, AppError> {
        Ok(self.client.post(self.endpoint(path)?).bearer_auth(token))
    }
}

async fn check(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        warn!(url = %response.url(), "backend rejected the bearer token");
        return Err(AppError::SessionExpired);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Upstream {
            status: status.as_u16(),
            message: upstream_message(&body),
        });
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    Ok(check(response).await?.json::<T>().await?)
}

fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AppError> {
        let response = self
            .client
            .post(self.endpoint("login")?)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        match decode(response).await {
            Err(AppError::SessionExpired) => Err(AppError::Unauthorized),
            other => other,
        }
    }

    async fn assigned_vehicle(
        &self,
        token: &str,
        driver_id: &str,
    ) -> Result<Option<VehicleAssignment>, AppError> {
        let response = self
            .get(token, "assigned_vehicle")?
            .query(&[("driverId", driver_id)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(driver = %driver_id, "no vehicle assigned");
            return Ok(None);
        }
        let body: AssignedVehicleResponse = decode(response).await?;
        Ok(body.vehicle)
    }

    async fn validate_driver_vehicle(
        &self,
        token: &str,
        driver_id: &str,
        vehicle_id: &str,
    ) -> Result<VehicleValidation, AppError> {
        let response = self
            .post(token, "validate_driver_vehicle")?
            .json(&json!({ "driverId": driver_id, "vehicleId": vehicle_id }))
            .send()
            .await?;
        decode(response).await
    }

    async fn upload_trip_photo(
        &self,
        token: &str,
        driver_id: &str,
        photo: &PhotoUpload,
    ) -> Result<String, AppError> {
        let part = Part::bytes(photo.bytes.clone())
            .file_name(photo.file_name.clone())
            .mime_str(&photo.content_type)?;
        let form = Form::new()
            .text("driverId", driver_id.to_string())
            .part("photo", part);
        let response = self
            .post(token, "upload_trip_photo")?
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = decode(response).await?;
        Ok(body.url)
    }

    async fn trip_action(
        &self,
        token: &str,
        action: &TripAction,
    ) -> Result<TripActionResponse, AppError> {
        debug!(action = action.name(), "posting trip action");
        let response = self.post(token, "trip_action")?.json(action).send().await?;
        let body: TripActionResponse = decode(response).await?;
        body.into_result()
    }

    async fn list_vehicles(&self, token: &str) -> Result<Vec<Vehicle>, AppError> {
        let response = self.get(token, "vehicle_list")?.send().await?;
        let body: ListEnvelope<Vehicle> = decode(response).await?;
        Ok(body.into_vec())
    }

    async fn list_attendees(&self, token: &str) -> Result<Vec<Attendee>, AppError> {
        let response = self.get(token, "attendees")?.send().await?;
        let body: ListEnvelope<Attendee> = decode(response).await?;
        Ok(body.into_vec())
    }

    async fn raise_ticket(&self, token: &str, ticket: &Ticket) -> Result<(), AppError> {
        let response = self.post(token, "raise_ticket")?.json(ticket).send().await?;
        check(response).await?;
        Ok(())
    }
}
