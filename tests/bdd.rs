mod common;

use chrono::Utc;
use common::{photo, token_expiring_in, TestConsole};
use cucumber::{given, then, when, World as _};
use fleet::{
    auth,
    error::AppError,
    models::{
        session::ActiveSession,
        trip::{Trip, TripState},
        vehicle::VehicleAssignment,
    },
};

#[derive(Debug, cucumber::World, Default)]
struct ConsoleWorld {
    console: Option<TestConsole>,
    session_id: Option<String>,
    guard_expired: Option<bool>,
    last_error: Option<String>,
    completed: Option<Trip>,
}

impl ConsoleWorld {
    fn console(&self) -> &TestConsole {
        self.console
            .as_ref()
            .expect("console must be initialised first")
    }

    fn driver(&self) -> ActiveSession {
        self.console().driver_session()
    }

    async fn trip_state(&self) -> TripState {
        let driver = self.driver();
        self.console()
            .state
            .trips
            .current(driver.driver_id())
            .await
            .expect("load trip state")
    }

    fn record<T>(&mut self, result: Result<T, AppError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(err) => {
                assert!(err.is_user_facing(), "unexpected error: {err:?}");
                self.last_error = Some(err.to_string());
                None
            }
        }
    }
}

#[given("a fresh console")]
async fn given_fresh_console(world: &mut ConsoleWorld) {
    world.console = Some(TestConsole::new().await.expect("console"));
}

// Session guard

async fn store_session(world: &mut ConsoleWorld, token: String) {
    let console = world.console();
    let profile = console.backend.profile.lock().unwrap().clone();
    let id = auth::create_session(&console.state.db, &token, &profile)
        .await
        .expect("create session");
    world.session_id = Some(id);
}

#[given(regex = r"^a stored session whose token expires in (-?\d+) seconds$")]
async fn given_session_expiring(world: &mut ConsoleWorld, seconds: i64) {
    store_session(world, token_expiring_in(seconds)).await;
}

#[given(regex = r#"^a stored session with token "([^"]*)"$"#)]
async fn given_session_with_token(world: &mut ConsoleWorld, token: String) {
    store_session(world, token).await;
}

#[when("the session guard runs")]
async fn when_guard_runs(world: &mut ConsoleWorld) {
    let db = &world.console().state.db;
    let id = world.session_id.as_deref().expect("session stored");
    let session = auth::load_session(db, id)
        .await
        .expect("load session")
        .expect("session row");
    let expired = match auth::ensure_session(db, session, Utc::now()).await {
        Ok(_) => false,
        Err(AppError::SessionExpired) => true,
        Err(err) => panic!("guard must not fail with {err:?}"),
    };
    world.guard_expired = Some(expired);
}

#[then("the session is reported expired")]
async fn then_session_expired(world: &mut ConsoleWorld) {
    assert_eq!(world.guard_expired, Some(true));
}

#[then("the session is accepted")]
async fn then_session_accepted(world: &mut ConsoleWorld) {
    assert_eq!(world.guard_expired, Some(false));
}

async fn stored_token(world: &ConsoleWorld) -> Option<String> {
    let id = world.session_id.as_deref().expect("session stored");
    let session = auth::load_session(&world.console().state.db, id)
        .await
        .expect("load session")
        .expect("session row");
    session.token
}

#[then("the stored token is gone")]
async fn then_token_gone(world: &mut ConsoleWorld) {
    assert_eq!(stored_token(world).await, None);
}

#[then("the stored token is kept")]
async fn then_token_kept(world: &mut ConsoleWorld) {
    assert!(stored_token(world).await.is_some());
}

// Trip lifecycle

#[given(regex = r#"^the driver is assigned vehicle "([^"]+)" numbered "([^"]+)"$"#)]
async fn given_assigned_vehicle(world: &mut ConsoleWorld, vehicle_id: String, vehicle_no: String) {
    let backend = &world.console().backend;
    let assignment = VehicleAssignment {
        driver_id: "42".into(),
        vehicle_id: vehicle_id.clone(),
        vehicle_no,
    };
    backend.profile.lock().unwrap().assigned_vehicle = Some(assignment.clone());
    *backend.assigned.lock().unwrap() = Some(assignment);
    backend.valid_vehicles.lock().unwrap().push(vehicle_id);
}

#[given(regex = r#"^the backend stores photos at "([^"]+)"$"#)]
async fn given_upload_url(world: &mut ConsoleWorld, url: String) {
    *world.console().backend.upload_url.lock().unwrap() = url;
}

#[given(regex = r#"^the driver is clocked in at "([^"]+)"$"#)]
async fn given_clocked_in(world: &mut ConsoleWorld, km: String) {
    let driver = world.driver();
    let trips = &world.console().state.trips;
    trips.use_assigned_vehicle(&driver).await.expect("identify");
    trips.record_start_km(&driver, &km).await.expect("start km");
    trips
        .clock_in(&driver, photo("image/jpeg", 1024))
        .await
        .expect("clock in");
}

#[when(regex = r#"^the driver scans the QR code "([^"]+)"$"#)]
async fn when_scan(world: &mut ConsoleWorld, qr: String) {
    let driver = world.driver();
    let result = world.console().state.trips.scan_vehicle(&driver, &qr).await;
    world.record(result);
}

#[when("the driver picks the assigned vehicle")]
async fn when_assigned(world: &mut ConsoleWorld) {
    let driver = world.driver();
    let result = world.console().state.trips.use_assigned_vehicle(&driver).await;
    world.record(result);
}

#[when(regex = r#"^the driver records a start reading of "([^"]*)"$"#)]
async fn when_start_km(world: &mut ConsoleWorld, km: String) {
    let driver = world.driver();
    let result = world.console().state.trips.record_start_km(&driver, &km).await;
    world.record(result);
}

#[when(regex = r#"^the driver records an end reading of "([^"]*)"$"#)]
async fn when_end_km(world: &mut ConsoleWorld, km: String) {
    let driver = world.driver();
    let result = world.console().state.trips.record_end_km(&driver, &km).await;
    world.record(result);
}

#[when(regex = r#"^the driver clocks in with a (\d+) byte "([^"]+)" photo$"#)]
async fn when_clock_in(world: &mut ConsoleWorld, len: usize, content_type: String) {
    let driver = world.driver();
    let result = world
        .console()
        .state
        .trips
        .clock_in(&driver, photo(&content_type, len))
        .await;
    world.record(result);
}

#[when(regex = r#"^the driver clocks out with a (\d+) byte "([^"]+)" photo$"#)]
async fn when_clock_out(world: &mut ConsoleWorld, len: usize, content_type: String) {
    let driver = world.driver();
    let result = world
        .console()
        .state
        .trips
        .clock_out(&driver, photo(&content_type, len))
        .await;
    world.completed = world.record(result);
}

#[when("the driver resets the trip")]
async fn when_reset(world: &mut ConsoleWorld) {
    let driver = world.driver();
    let result = world.console().state.trips.reset(&driver).await;
    world.record(result);
}

#[then("the action is rejected")]
async fn then_rejected(world: &mut ConsoleWorld) {
    assert!(world.last_error.is_some(), "expected the last action to fail");
}

#[then("the driver is clocked in")]
async fn then_clocked_in(world: &mut ConsoleWorld) {
    let state = world.trip_state().await;
    assert!(matches!(state, TripState::ClockedIn { .. }), "got {state:?}");
}

#[then("the driver is idle")]
async fn then_idle(world: &mut ConsoleWorld) {
    assert_eq!(world.trip_state().await, TripState::Idle);
}

#[then(regex = r#"^the last trip action has "([^"]+)" set to "([^"]*)"$"#)]
async fn then_last_action_field(world: &mut ConsoleWorld, field: String, expected: String) {
    let action = world
        .console()
        .backend
        .last_action()
        .expect("a trip action was sent");
    assert_eq!(action[field.as_str()], expected.as_str(), "body was {action}");
}

#[then(regex = r#"^the last trip action has "([^"]+)" equal to (-?\d+(?:\.\d+)?)$"#)]
async fn then_last_action_number(world: &mut ConsoleWorld, field: String, expected: f64) {
    let action = world
        .console()
        .backend
        .last_action()
        .expect("a trip action was sent");
    assert_eq!(action[field.as_str()].as_f64(), Some(expected), "body was {action}");
}

#[then(regex = r"^(\d+) trip actions? (?:was|were) sent$")]
async fn then_action_count(world: &mut ConsoleWorld, expected: usize) {
    assert_eq!(world.console().backend.action_count(), expected);
}

#[then("no photo was uploaded")]
async fn then_no_upload(world: &mut ConsoleWorld) {
    assert!(world.console().backend.uploads.lock().unwrap().is_empty());
}

#[then(regex = r"^the completed trip covers (-?\d+(?:\.\d+)?) km$")]
async fn then_total_km(world: &mut ConsoleWorld, expected: f64) {
    let trip = world.completed.as_ref().expect("trip was completed");
    assert_eq!(trip.total_km, Some(expected));
    assert!(trip.is_complete());
}

#[tokio::main]
async fn main() {
    ConsoleWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
