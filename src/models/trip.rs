use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::vehicle::VehicleAssignment;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TripError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
    #[error("invalid odometer reading: {0}")]
    InvalidOdometer(String),
    #[error("invalid photo: {0}")]
    InvalidPhoto(String),
    #[error("could not read a vehicle id from the QR code")]
    UnreadableQr,
    #[error("vehicle {0} is not assigned to you")]
    VehicleNotAssigned(String),
    #[error("no vehicle is assigned to you")]
    NoAssignedVehicle,
}

/// Numeric odometer reading. Serialized as the text the driver typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Odometer {
    raw: String,
    value: f64,
}

impl Odometer {
    pub fn parse(input: &str) -> Result<Self, TripError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TripError::InvalidOdometer("a reading is required".into()));
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| TripError::InvalidOdometer(format!("`{trimmed}` is not a number")))?;
        if !value.is_finite() {
            return Err(TripError::InvalidOdometer(format!("`{trimmed}` is not a number")));
        }
        Ok(Self {
            raw: trimmed.to_string(),
            value,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl TryFrom<String> for Odometer {
    type Error = TripError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Odometer::parse(&value)
    }
}

impl From<Odometer> for String {
    fn from(odometer: Odometer) -> Self {
        odometer.raw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleVerification {
    /// QR code confirmed by `/validate_driver_vehicle`.
    Scanned,
    /// Pre-fetched assignment, not re-validated.
    Assigned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub trip_id: String,
    pub vehicle_id: String,
    pub vehicle_no: String,
    pub driver_id: String,
    pub driver_name: String,
    pub start_km: Odometer,
    pub start_time: DateTime<Utc>,
    pub start_photo_url: String,
    #[serde(default)]
    pub end_km: Option<Odometer>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_photo_url: Option<String>,
    #[serde(default)]
    pub total_km: Option<f64>,
}

impl Trip {
    /// Close the trip. `endKm < startKm` yields a negative total; odometer
    /// rollover is left to the backend.
    pub fn complete(mut self, end_km: Odometer, end_photo_url: String, end_time: DateTime<Utc>) -> Self {
        self.total_km = Some(total_km(&self.start_km, &end_km));
        self.end_km = Some(end_km);
        self.end_photo_url = Some(end_photo_url);
        self.end_time = Some(end_time);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let until = self.end_time.unwrap_or(now);
        (until - self.start_time).max(Duration::zero())
    }
}

pub fn total_km(start: &Odometer, end: &Odometer) -> f64 {
    end.value() - start.value()
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Per-driver clock-in/out state. Transitions are pure; the trip service
/// does the I/O around them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TripState {
    #[default]
    Idle,
    VehicleIdentified {
        vehicle: VehicleAssignment,
        verification: VehicleVerification,
    },
    StartKmRecorded {
        vehicle: VehicleAssignment,
        verification: VehicleVerification,
        start_km: Odometer,
    },
    ClockedIn {
        trip: Trip,
    },
    EndKmRecorded {
        trip: Trip,
        end_km: Odometer,
    },
}

impl TripState {
    pub fn name(&self) -> &'static str {
        match self {
            TripState::Idle => "idle",
            TripState::VehicleIdentified { .. } => "vehicle identified",
            TripState::StartKmRecorded { .. } => "start reading recorded",
            TripState::ClockedIn { .. } => "clocked in",
            TripState::EndKmRecorded { .. } => "end reading recorded",
        }
    }

    fn reject(&self, action: &'static str) -> TripError {
        TripError::InvalidTransition {
            state: self.name(),
            action,
        }
    }

    pub fn vehicle(&self) -> Option<&VehicleAssignment> {
        match self {
            TripState::Idle => None,
            TripState::VehicleIdentified { vehicle, .. }
            | TripState::StartKmRecorded { vehicle, .. } => Some(vehicle),
            TripState::ClockedIn { .. } | TripState::EndKmRecorded { .. } => None,
        }
    }

    pub fn trip(&self) -> Option<&Trip> {
        match self {
            TripState::ClockedIn { trip } | TripState::EndKmRecorded { trip, .. } => Some(trip),
            _ => None,
        }
    }

    /// Vehicle identification only starts from `Idle`, so an open trip can
    /// never be clocked in a second time.
    pub fn ensure_can_identify(&self) -> Result<(), TripError> {
        match self {
            TripState::Idle => Ok(()),
            _ => Err(self.reject("identify a vehicle")),
        }
    }

    pub fn identify(
        &self,
        vehicle: VehicleAssignment,
        verification: VehicleVerification,
    ) -> Result<TripState, TripError> {
        self.ensure_can_identify()?;
        Ok(TripState::VehicleIdentified {
            vehicle,
            verification,
        })
    }

    pub fn record_start_km(&self, raw: &str) -> Result<TripState, TripError> {
        match self {
            TripState::VehicleIdentified {
                vehicle,
                verification,
            }
            | TripState::StartKmRecorded {
                vehicle,
                verification,
                ..
            } => Ok(TripState::StartKmRecorded {
                vehicle: vehicle.clone(),
                verification: *verification,
                start_km: Odometer::parse(raw)?,
            }),
            _ => Err(self.reject("record a start reading")),
        }
    }

    pub fn clock_in_draft(&self) -> Result<(&VehicleAssignment, &Odometer), TripError> {
        match self {
            TripState::StartKmRecorded {
                vehicle, start_km, ..
            } => Ok((vehicle, start_km)),
            _ => Err(self.reject("clock in")),
        }
    }

    pub fn clocked_in(&self, trip: Trip) -> Result<TripState, TripError> {
        self.clock_in_draft()?;
        Ok(TripState::ClockedIn { trip })
    }

    pub fn record_end_km(&self, raw: &str) -> Result<TripState, TripError> {
        match self {
            TripState::ClockedIn { trip } | TripState::EndKmRecorded { trip, .. } => {
                Ok(TripState::EndKmRecorded {
                    trip: trip.clone(),
                    end_km: Odometer::parse(raw)?,
                })
            }
            _ => Err(self.reject("record an end reading")),
        }
    }

    pub fn clock_out_draft(&self) -> Result<(&Trip, &Odometer), TripError> {
        match self {
            TripState::EndKmRecorded { trip, end_km } => Ok((trip, end_km)),
            _ => Err(self.reject("clock out")),
        }
    }

    pub fn clocked_out(&self) -> Result<TripState, TripError> {
        self.clock_out_draft()?;
        Ok(TripState::Idle)
    }

    /// Drop whatever the driver entered locally. A trip that is already open
    /// on the server stays open.
    pub fn reset(&self) -> TripState {
        match self {
            TripState::ClockedIn { trip } | TripState::EndKmRecorded { trip, .. } => {
                TripState::ClockedIn { trip: trip.clone() }
            }
            _ => TripState::Idle,
        }
    }
}
