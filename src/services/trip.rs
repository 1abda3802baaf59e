use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        photo::PhotoUpload,
        session::ActiveSession,
        trip::{total_km, Trip, TripError, TripState, VehicleVerification},
        vehicle::VehicleAssignment,
    },
    services::{
        api::{BackendApi, ClockIn, ClockOut, TripAction, VehicleValidation},
        storage::StorageService,
    },
};

/// Drives the clock-in/out state machine for one driver at a time.
#[derive(Clone)]
pub struct TripService {
    storage: StorageService,
    api: Arc<dyn BackendApi>,
    max_photo_bytes: usize,
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl TripService {
    pub fn new(storage: StorageService, api: Arc<dyn BackendApi>, max_photo_bytes: usize) -> Self {
        Self {
            storage,
            api,
            max_photo_bytes,
            locks: Arc::default(),
        }
    }

    /// Serializes transitions for one driver within this process.
    async fn lock(&self, driver_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(driver_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn current(&self, driver_id: &str) -> Result<TripState, AppError> {
        self.storage.load_trip_state(driver_id).await
    }

    async fn commit(&self, driver_id: &str, next: TripState) -> Result<TripState, AppError> {
        self.storage.save_trip_state(driver_id, &next).await?;
        Ok(next)
    }

    pub async fn scan_vehicle(
        &self,
        session: &ActiveSession,
        qr_payload: &str,
    ) -> Result<TripState, AppError> {
        let driver_id = session.driver_id();
        let _guard = self.lock(driver_id).await;
        let state = self.current(driver_id).await?;
        state.ensure_can_identify()?;

        let vehicle_id = parse_qr_payload(qr_payload)?;
        let validation = self
            .api
            .validate_driver_vehicle(&session.token, driver_id, &vehicle_id)
            .await?;
        let vehicle = match confirmed_vehicle(validation, session, &vehicle_id) {
            Ok(vehicle) => vehicle,
            Err(err) => {
                warn!(driver = %driver_id, vehicle = %vehicle_id, "scanned vehicle is not assigned");
                return Err(err.into());
            }
        };

        info!(driver = %driver_id, vehicle = %vehicle.vehicle_id, "vehicle confirmed by scan");
        let next = state.identify(vehicle, VehicleVerification::Scanned)?;
        self.commit(driver_id, next).await
    }

    /// Manual fallback. Trusts the assignment fetched at login without asking
    /// the backend again.
    pub async fn use_assigned_vehicle(&self, session: &ActiveSession) -> Result<TripState, AppError> {
        let driver_id = session.driver_id();
        let _guard = self.lock(driver_id).await;
        let state = self.current(driver_id).await?;

        let vehicle = session
            .profile
            .assigned_vehicle
            .clone()
            .ok_or(TripError::NoAssignedVehicle)?;
        info!(driver = %driver_id, vehicle = %vehicle.vehicle_id, "using assigned vehicle without scan");
        let next = state.identify(vehicle, VehicleVerification::Assigned)?;
        self.commit(driver_id, next).await
    }

    pub async fn record_start_km(
        &self,
        session: &ActiveSession,
        raw: &str,
    ) -> Result<TripState, AppError> {
        let driver_id = session.driver_id();
        let _guard = self.lock(driver_id).await;
        let next = self.current(driver_id).await?.record_start_km(raw)?;
        self.commit(driver_id, next).await
    }

    pub async fn clock_in(
        &self,
        session: &ActiveSession,
        photo: PhotoUpload,
    ) -> Result<Trip, AppError> {
        let driver_id = session.driver_id();
        let _guard = self.lock(driver_id).await;
        let state = self.current(driver_id).await?;
        let (vehicle, start_km) = state.clock_in_draft()?;
        photo.validate(self.max_photo_bytes)?;

        let photo_url = self
            .api
            .upload_trip_photo(&session.token, driver_id, &photo)
            .await?;
        let start_time = Utc::now();
        let action = TripAction::ClockIn(ClockIn {
            driver_id: driver_id.to_string(),
            driver_name: session.profile.name.clone(),
            vehicle_id: vehicle.vehicle_id.clone(),
            vehicle_no: vehicle.vehicle_no.clone(),
            start_km: start_km.clone(),
            start_photo: photo_url.clone(),
            start_time,
        });
        let response = self.api.trip_action(&session.token, &action).await?;

        let trip = Trip {
            trip_id: response
                .trip_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            vehicle_id: vehicle.vehicle_id.clone(),
            vehicle_no: vehicle.vehicle_no.clone(),
            driver_id: driver_id.to_string(),
            driver_name: session.profile.name.clone(),
            start_km: start_km.clone(),
            start_time,
            start_photo_url: photo_url,
            end_km: None,
            end_time: None,
            end_photo_url: None,
            total_km: None,
        };
        let next = state.clocked_in(trip.clone())?;
        self.commit(driver_id, next).await?;
        info!(driver = %driver_id, trip = %trip.trip_id, start_km = %trip.start_km.as_str(), "clocked in");
        Ok(trip)
    }

    pub async fn record_end_km(
        &self,
        session: &ActiveSession,
        raw: &str,
    ) -> Result<TripState, AppError> {
        let driver_id = session.driver_id();
        let _guard = self.lock(driver_id).await;
        let next = self.current(driver_id).await?.record_end_km(raw)?;
        self.commit(driver_id, next).await
    }

    /// Returns the completed trip; the stored state goes back to `Idle`.
    pub async fn clock_out(
        &self,
        session: &ActiveSession,
        photo: PhotoUpload,
    ) -> Result<Trip, AppError> {
        let driver_id = session.driver_id();
        let _guard = self.lock(driver_id).await;
        let state = self.current(driver_id).await?;
        let (trip, end_km) = state.clock_out_draft()?;
        photo.validate(self.max_photo_bytes)?;

        let photo_url = self
            .api
            .upload_trip_photo(&session.token, driver_id, &photo)
            .await?;
        let end_time = Utc::now();
        let total = total_km(&trip.start_km, end_km);
        if total < 0.0 {
            warn!(driver = %driver_id, trip = %trip.trip_id, total_km = total, "end reading is below start reading");
        }
        let action = TripAction::ClockOut(ClockOut {
            trip_id: trip.trip_id.clone(),
            driver_id: driver_id.to_string(),
            vehicle_id: trip.vehicle_id.clone(),
            end_km: end_km.clone(),
            end_photo: photo_url.clone(),
            end_time,
            total_km: total,
        });
        self.api.trip_action(&session.token, &action).await?;

        let completed = trip.clone().complete(end_km.clone(), photo_url, end_time);
        let next = state.clocked_out()?;
        self.commit(driver_id, next).await?;
        info!(driver = %driver_id, trip = %completed.trip_id, total_km = total, "clocked out");
        Ok(completed)
    }

    /// Local only; nothing is sent to the backend.
    pub async fn reset(&self, session: &ActiveSession) -> Result<TripState, AppError> {
        let driver_id = session.driver_id();
        let _guard = self.lock(driver_id).await;
        let next = self.current(driver_id).await?.reset();
        self.commit(driver_id, next).await
    }
}

/// The backend's answer must name the vehicle that was scanned and the
/// driver asking. Without a vehicle object the scanned id is used as is.
pub fn confirmed_vehicle(
    validation: VehicleValidation,
    session: &ActiveSession,
    scanned_id: &str,
) -> Result<VehicleAssignment, TripError> {
    let driver_id = session.driver_id();
    if !validation.valid {
        return Err(TripError::VehicleNotAssigned(scanned_id.to_string()));
    }
    match validation.vehicle {
        Some(vehicle) if vehicle.vehicle_id == scanned_id && vehicle.driver_id == driver_id => {
            Ok(vehicle)
        }
        Some(_) => Err(TripError::VehicleNotAssigned(scanned_id.to_string())),
        None => {
            let vehicle_no = session
                .profile
                .assigned_vehicle
                .as_ref()
                .filter(|assigned| assigned.vehicle_id == scanned_id)
                .map(|assigned| assigned.vehicle_no.clone())
                .unwrap_or_else(|| scanned_id.to_string());
            Ok(VehicleAssignment {
                driver_id: driver_id.to_string(),
                vehicle_id: scanned_id.to_string(),
                vehicle_no,
            })
        }
    }
}

/// QR codes carry either the bare vehicle id or a small JSON object.
pub fn parse_qr_payload(payload: &str) -> Result<String, TripError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(TripError::UnreadableQr);
    }
    if !trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|_| TripError::UnreadableQr)?;
    for key in ["vehicleId", "vehicle_id", "id"] {
        match value.get(key) {
            Some(Value::String(id)) if !id.trim().is_empty() => return Ok(id.trim().to_string()),
            Some(Value::Number(id)) => return Ok(id.to_string()),
            _ => {}
        }
    }
    Err(TripError::UnreadableQr)
}
