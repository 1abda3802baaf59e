#![allow(dead_code)]

use std::{
    fmt,
    fs::File,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use anyhow::Context;
use async_trait::async_trait;
use axum::{http::header, response::IntoResponse};
use axum_extra::extract::PrivateCookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use fleet::{
    auth,
    config::{parse_base_url, AppConfig},
    db::{init_pool, run_migrations},
    error::AppError,
    models::{
        attendee::Attendee,
        photo::PhotoUpload,
        session::ActiveSession,
        ticket::Ticket,
        user::{UserProfile, UserRole},
        vehicle::{Vehicle, VehicleAssignment},
    },
    services::{
        api::{BackendApi, LoginResponse, TripAction, TripActionResponse, VehicleValidation},
        storage::StorageService,
    },
    state::AppState,
};
use serde_json::Value;
use tempfile::TempDir;

pub fn token_expiring_in(seconds: i64) -> String {
    let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"42","exp":{exp}}}"#));
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// In-process stand-in for the transport backend that records what it was
/// sent.
pub struct RecordingBackend {
    pub profile: Mutex<UserProfile>,
    pub login_token: Mutex<String>,
    pub assigned: Mutex<Option<VehicleAssignment>>,
    pub valid_vehicles: Mutex<Vec<String>>,
    pub upload_url: Mutex<String>,
    pub uploads: Mutex<Vec<String>>,
    pub actions: Mutex<Vec<Value>>,
    pub tickets: Mutex<Vec<Value>>,
    pub vehicles: Mutex<Vec<Vehicle>>,
    pub reject_tokens: AtomicBool,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            profile: Mutex::new(UserProfile {
                id: "42".into(),
                name: "Asha".into(),
                role: UserRole::Driver,
                assigned_vehicle: None,
            }),
            login_token: Mutex::new(token_expiring_in(3600)),
            assigned: Mutex::new(None),
            valid_vehicles: Mutex::new(Vec::new()),
            upload_url: Mutex::new("https://photos.example/odo.jpg".into()),
            uploads: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
            tickets: Mutex::new(Vec::new()),
            vehicles: Mutex::new(Vec::new()),
            reject_tokens: AtomicBool::new(false),
        }
    }
}

impl RecordingBackend {
    fn authorize(&self) -> Result<(), AppError> {
        if self.reject_tokens.load(Ordering::SeqCst) {
            Err(AppError::SessionExpired)
        } else {
            Ok(())
        }
    }

    pub fn last_action(&self) -> Option<Value> {
        self.actions.lock().unwrap().last().cloned()
    }

    pub fn action_count(&self) -> usize {
        self.actions.lock().unwrap().len()
    }
}

#[async_trait]
impl BackendApi for RecordingBackend {
    async fn login(&self, _username: &str, password: &str) -> Result<LoginResponse, AppError> {
        if password != "secret" {
            return Err(AppError::Unauthorized);
        }
        let user = self.profile.lock().unwrap().clone();
        Ok(LoginResponse {
            token: self.login_token.lock().unwrap().clone(),
            role: Some(user.role),
            user,
        })
    }

    async fn assigned_vehicle(
        &self,
        _token: &str,
        _driver_id: &str,
    ) -> Result<Option<VehicleAssignment>, AppError> {
        self.authorize()?;
        Ok(self.assigned.lock().unwrap().clone())
    }

    async fn validate_driver_vehicle(
        &self,
        _token: &str,
        driver_id: &str,
        vehicle_id: &str,
    ) -> Result<VehicleValidation, AppError> {
        self.authorize()?;
        let valid = self
            .valid_vehicles
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == vehicle_id);
        Ok(VehicleValidation {
            valid,
            vehicle: valid.then(|| VehicleAssignment {
                driver_id: driver_id.to_string(),
                vehicle_id: vehicle_id.to_string(),
                vehicle_no: format!("NO-{vehicle_id}"),
            }),
            message: None,
        })
    }

    async fn upload_trip_photo(
        &self,
        _token: &str,
        _driver_id: &str,
        photo: &PhotoUpload,
    ) -> Result<String, AppError> {
        self.authorize()?;
        self.uploads.lock().unwrap().push(photo.file_name.clone());
        Ok(self.upload_url.lock().unwrap().clone())
    }

    async fn trip_action(
        &self,
        _token: &str,
        action: &TripAction,
    ) -> Result<TripActionResponse, AppError> {
        self.authorize()?;
        let mut actions = self.actions.lock().unwrap();
        actions.push(serde_json::to_value(action).unwrap());
        Ok(TripActionResponse {
            success: Some(true),
            trip_id: Some(format!("trip-{}", actions.len())),
            ..TripActionResponse::default()
        })
    }

    async fn list_vehicles(&self, _token: &str) -> Result<Vec<Vehicle>, AppError> {
        self.authorize()?;
        Ok(self.vehicles.lock().unwrap().clone())
    }

    async fn list_attendees(&self, _token: &str) -> Result<Vec<Attendee>, AppError> {
        self.authorize()?;
        Ok(Vec::new())
    }

    async fn raise_ticket(&self, _token: &str, ticket: &Ticket) -> Result<(), AppError> {
        self.authorize()?;
        self.tickets
            .lock()
            .unwrap()
            .push(serde_json::to_value(ticket).unwrap());
        Ok(())
    }
}

pub struct TestConsole {
    pub state: AppState,
    pub backend: Arc<RecordingBackend>,
    _root: TempDir,
}

impl fmt::Debug for TestConsole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestConsole").finish()
    }
}

impl TestConsole {
    pub async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for test console")?;
        let data_root = root.path().join("data");
        std::fs::create_dir_all(&data_root)?;

        let db_path = root.path().join("sessions.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_root: data_root.clone(),
            api_base_url: parse_base_url("http://backend.test/api")?,
            cookie_secret: "test-cookie-secret".into(),
            max_photo_bytes: 5 * 1024 * 1024,
        };

        let db = init_pool(&config.database_url).await?;
        run_migrations(&db).await?;

        let storage = StorageService::new(data_root);
        storage.ensure_structure().await?;

        let backend = Arc::new(RecordingBackend::default());
        let state = AppState::new(config, db, storage, backend.clone());
        Ok(Self {
            state,
            backend,
            _root: root,
        })
    }

    pub fn driver_session(&self) -> ActiveSession {
        let profile = self.backend.profile.lock().unwrap().clone();
        ActiveSession {
            session_id: "test-session".into(),
            token: token_expiring_in(3600),
            role: profile.role,
            profile,
        }
    }
}

/// `Cookie` header value for a session row, encrypted with the console key.
pub fn session_cookie(state: &AppState, session_id: &str) -> String {
    let jar = auth::apply_session_cookie(PrivateCookieJar::new(state.cookie_key.clone()), session_id);
    let response = jar.into_response();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("session cookie");
    set_cookie.split(';').next().unwrap_or_default().to_string()
}

pub fn photo(content_type: &str, len: usize) -> PhotoUpload {
    PhotoUpload {
        file_name: "odometer.jpg".into(),
        content_type: content_type.into(),
        bytes: vec![0xAB; len],
    }
}
