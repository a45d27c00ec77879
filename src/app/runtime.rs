use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::niu_http::{NiuClient, NiuClientError, NiuHttpClient};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::retry::with_retries;
use crate::app::state::{ScooterState, SharedScooterState, shared_state};
use crate::domain::auth_state::AuthState;
use crate::domain::readings::{ReadingGate, project};
use crate::domain::sensor_catalog::SensorDescriptor;
use crate::domain::snapshots::TelemetryCategory;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("authentication failed: {0}")]
    Authentication(#[source] NiuClientError),
    #[error("vehicle discovery failed: {0}")]
    VehicleDiscovery(#[source] NiuClientError),
    #[error("token rejected by the vendor api: {0}")]
    TokenRejected(#[source] NiuClientError),
    #[error("coordinator disabled: {0}")]
    Fatal(String),
    #[error("state lock poisoned")]
    StateLockPoisoned,
}

/// Polls the vendor api once per cycle and publishes sensor readings
/// into the shared state. All mutable state (token, serial, snapshots,
/// published readings) is owned here and only touched from `tick`.
pub struct ScooterPoller<C> {
    client: C,
    username: String,
    password: String,
    scooter_index: usize,
    sensors: Vec<&'static SensorDescriptor>,
    auth: AuthState,
    gate: ReadingGate,
    state: SharedScooterState,
}

impl<C> ScooterPoller<C>
where
    C: NiuClient,
{
    pub fn new(client: C, config: &AppConfig, state: SharedScooterState) -> Self {
        Self::with_auth(client, config, AuthState::new(), state)
    }

    /// Continues from a setup-time validation that already holds a token
    /// and resolved serial.
    pub fn preauthorized(
        client: C,
        config: &AppConfig,
        token: String,
        serial: String,
        state: SharedScooterState,
    ) -> Self {
        Self::with_auth(client, config, AuthState::preauthorized(token, serial), state)
    }

    fn with_auth(
        client: C,
        config: &AppConfig,
        auth: AuthState,
        state: SharedScooterState,
    ) -> Self {
        Self {
            client,
            username: config.username.clone(),
            password: config.password.clone(),
            scooter_index: config.scooter_index,
            sensors: config.sensors.clone(),
            auth,
            gate: ReadingGate::new(config.validation),
            state,
        }
    }

    /// One refresh cycle. Successful whenever authentication held, even
    /// if every telemetry call failed individually.
    pub fn tick(&mut self) -> Result<(), PollError> {
        if let Some(reason) = self.auth.failure_reason() {
            return Err(PollError::Fatal(reason.to_string()));
        }

        let outcome = self.refresh();
        self.sync_shared_state(outcome.is_ok());
        outcome
    }

    fn refresh(&mut self) -> Result<(), PollError> {
        let token = self.ensure_token()?;
        let serial = self.ensure_serial(&token)?;

        for category in TelemetryCategory::ALL {
            match self.fetch(category, &serial, &token) {
                Ok(payload) => {
                    self.with_state(|state| state.snapshots.replace(category, payload))?;
                }
                Err(error) if error.is_auth() => {
                    tracing::error!(
                        category = category.as_str(),
                        error = %error,
                        "token rejected, re-authenticating next cycle"
                    );
                    self.auth.on_auth_error();
                    return Err(PollError::TokenRejected(error));
                }
                Err(error) => {
                    tracing::warn!(
                        category = category.as_str(),
                        error = %error,
                        "telemetry fetch failed, cached snapshot retained"
                    );
                }
            }
        }

        Ok(())
    }

    fn ensure_token(&mut self) -> Result<String, PollError> {
        if let Some(token) = self.auth.token() {
            return Ok(token.to_string());
        }

        let token = self
            .client
            .authenticate(&self.username, &self.password)
            .map_err(PollError::Authentication)?;
        self.auth.on_authenticated(token.clone());
        tracing::info!("authenticated against the vendor api");
        Ok(token)
    }

    fn ensure_serial(&mut self, token: &str) -> Result<String, PollError> {
        if let Some(serial) = self.auth.serial() {
            return Ok(serial.to_string());
        }

        let vehicles = match self.client.list_vehicles(token) {
            Ok(vehicles) => vehicles,
            Err(error) if error.is_auth() => {
                self.auth.on_auth_error();
                return Err(PollError::TokenRejected(error));
            }
            Err(error) => return Err(PollError::VehicleDiscovery(error)),
        };

        let Some(vehicle) = vehicles.get(self.scooter_index) else {
            let reason = format!(
                "scooter index {} out of range ({} vehicles)",
                self.scooter_index,
                vehicles.len()
            );
            self.auth.on_fatal(reason.clone());
            return Err(PollError::Fatal(reason));
        };

        self.auth.on_serial_resolved(vehicle.serial_number.clone());
        let serial = vehicle.serial_number.clone();
        let name = vehicle.name.clone();
        self.with_state(|state| {
            state.serial = Some(serial.clone());
            state.scooter_name = Some(name.clone());
        })?;
        tracing::info!(serial = %vehicle.serial_number, name = %vehicle.name, "vehicle resolved");
        Ok(vehicle.serial_number.clone())
    }

    fn fetch(
        &self,
        category: TelemetryCategory,
        serial: &str,
        token: &str,
    ) -> Result<Value, NiuClientError> {
        match category {
            TelemetryCategory::Battery => self.client.battery_info(serial, token),
            TelemetryCategory::Motor => self.client.motor_info(serial, token),
            TelemetryCategory::Overall => self.client.overall_info(serial, token),
            TelemetryCategory::Track => self.client.track_info(serial, token),
        }
    }

    fn sync_shared_state(&mut self, refresh_succeeded: bool) {
        let Ok(mut state) = self.state.lock() else {
            tracing::error!("state lock poisoned, skipping published readings update");
            return;
        };

        for descriptor in &self.sensors {
            let fresh = project(&state.snapshots, descriptor);
            let admitted = self.gate.admit(descriptor, fresh);
            state.published.insert(descriptor.name, admitted);
        }

        state.authenticated = !self.auth.needs_authentication() && !self.auth.is_failed();
        state.failure = self.auth.failure_reason().map(str::to_string);
        if refresh_succeeded {
            state.last_refresh = Some(Utc::now());
        }
    }

    fn with_state<T>(&self, op: impl FnOnce(&mut ScooterState) -> T) -> Result<T, PollError> {
        let mut state = self.state.lock().map_err(|_| PollError::StateLockPoisoned)?;
        Ok(op(&mut state))
    }
}

pub fn start_poller<C>(
    mut poller: ScooterPoller<C>,
    poll_interval: Duration,
    stop_flag: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    C: NiuClient,
{
    std::thread::spawn(move || {
        while !stop_flag.load(Ordering::Relaxed) {
            match poller.tick() {
                Ok(()) => {}
                Err(PollError::Fatal(reason)) => {
                    tracing::error!(reason = %reason, "poller halted by configuration error");
                    break;
                }
                Err(error) => tracing::warn!(error = %error, "poll cycle failed"),
            }
            std::thread::sleep(poll_interval);
        }
    })
}

#[derive(Debug)]
pub struct SetupOutcome {
    pub token: String,
    pub serial: String,
    pub scooter_name: String,
}

/// Setup-time validation: authenticate, list vehicles and pick the
/// configured index, with bounded retries around the network calls. An
/// out-of-range index is a configuration error and is never retried.
pub fn validate_setup<C>(client: &C, config: &AppConfig) -> Result<SetupOutcome, AppError>
where
    C: NiuClient,
{
    let (token, vehicles) = with_retries(
        config.setup_attempts,
        Duration::from_millis(config.setup_retry_delay_ms),
        || {
            let token = client.authenticate(&config.username, &config.password)?;
            let vehicles = client.list_vehicles(&token)?;
            Ok::<_, NiuClientError>((token, vehicles))
        },
    )
    .map_err(|error| {
        if error.is_auth() {
            AppError::setup("invalid authentication")
        } else {
            AppError::setup(format!("cannot connect: {error}"))
        }
    })?;

    let vehicle = vehicles.get(config.scooter_index).ok_or_else(|| {
        AppError::config(format!(
            "scooter index {} out of range ({} vehicles)",
            config.scooter_index,
            vehicles.len()
        ))
    })?;

    Ok(SetupOutcome {
        token,
        serial: vehicle.serial_number.clone(),
        scooter_name: vehicle.name.clone(),
    })
}

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let client = NiuHttpClient::new().map_err(AppError::setup)?;
    let setup = validate_setup(&client, &config)?;
    tracing::info!(serial = %setup.serial, name = %setup.scooter_name, "scooter resolved");

    let state = shared_state();
    {
        let mut locked = state
            .lock()
            .map_err(|_| AppError::runtime("state lock poisoned"))?;
        locked.serial = Some(setup.serial.clone());
        locked.scooter_name = Some(setup.scooter_name.clone());
        locked.authenticated = true;
    }

    let poller = ScooterPoller::preauthorized(
        client,
        &config,
        setup.token,
        setup.serial,
        Arc::clone(&state),
    );
    let stop_flag = Arc::new(AtomicBool::new(false));
    let poller_handle = start_poller(
        poller,
        Duration::from_secs(config.poll_interval_secs),
        Arc::clone(&stop_flag),
    );

    let api_state = ApiState {
        state: Arc::clone(&state),
        sensors: config.sensors.clone(),
        scooter_index: config.scooter_index,
    };

    tracing::info!(bind = %config.http_bind, "http server starting");

    let server_result = actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .app_data(web::Data::new(api_state.clone()))
                .configure(configure_routes)
        })
        .bind(&config.http_bind)?
        .run()
        .await
    });

    stop_flag.store(true, Ordering::Relaxed);
    if poller_handle.join().is_err() {
        return Err(AppError::runtime("poller thread panicked"));
    }

    server_result.map_err(AppError::runtime)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use crate::adapters::niu_http::{NiuClient, NiuClientError, Vehicle};
    use crate::app::config::AppConfig;
    use crate::app::error::AppError;
    use crate::app::state::{SharedScooterState, shared_state};
    use crate::domain::readings::ValidationPolicy;
    use crate::domain::sensor_catalog::resolve_selection;

    use super::{PollError, ScooterPoller, validate_setup};

    #[derive(Default)]
    struct ScriptedClient {
        auth: Mutex<VecDeque<Result<String, NiuClientError>>>,
        vehicles: Mutex<VecDeque<Result<Vec<Vehicle>, NiuClientError>>>,
        battery: Mutex<VecDeque<Result<Value, NiuClientError>>>,
        motor: Mutex<VecDeque<Result<Value, NiuClientError>>>,
        overall: Mutex<VecDeque<Result<Value, NiuClientError>>>,
        track: Mutex<VecDeque<Result<Value, NiuClientError>>>,
    }

    impl ScriptedClient {
        fn push_auth(self, result: Result<String, NiuClientError>) -> Self {
            self.auth.lock().unwrap().push_back(result);
            self
        }

        fn push_vehicles(self, result: Result<Vec<Vehicle>, NiuClientError>) -> Self {
            self.vehicles.lock().unwrap().push_back(result);
            self
        }

        fn push_battery(self, result: Result<Value, NiuClientError>) -> Self {
            self.battery.lock().unwrap().push_back(result);
            self
        }

        fn push_motor(self, result: Result<Value, NiuClientError>) -> Self {
            self.motor.lock().unwrap().push_back(result);
            self
        }

        fn push_overall(self, result: Result<Value, NiuClientError>) -> Self {
            self.overall.lock().unwrap().push_back(result);
            self
        }

        fn push_track(self, result: Result<Value, NiuClientError>) -> Self {
            self.track.lock().unwrap().push_back(result);
            self
        }

        fn pop(
            queue: &Mutex<VecDeque<Result<Value, NiuClientError>>>,
            endpoint: &str,
        ) -> Result<Value, NiuClientError> {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected {endpoint} call"))
        }
    }

    impl NiuClient for ScriptedClient {
        fn authenticate(&self, _username: &str, _password: &str) -> Result<String, NiuClientError> {
            self.auth
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected authenticate call")
        }

        fn list_vehicles(&self, _token: &str) -> Result<Vec<Vehicle>, NiuClientError> {
            self.vehicles
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected list_vehicles call")
        }

        fn battery_info(&self, _serial: &str, _token: &str) -> Result<Value, NiuClientError> {
            Self::pop(&self.battery, "battery_info")
        }

        fn motor_info(&self, _serial: &str, _token: &str) -> Result<Value, NiuClientError> {
            Self::pop(&self.motor, "motor_info")
        }

        fn overall_info(&self, _serial: &str, _token: &str) -> Result<Value, NiuClientError> {
            Self::pop(&self.overall, "overall_info")
        }

        fn track_info(&self, _serial: &str, _token: &str) -> Result<Value, NiuClientError> {
            Self::pop(&self.track, "track_info")
        }
    }

    fn test_config(sensor_names: &[&str], scooter_index: usize) -> AppConfig {
        let names: Vec<String> = sensor_names.iter().map(|name| name.to_string()).collect();
        AppConfig {
            username: "rider@example.com".to_string(),
            password: "pw".to_string(),
            scooter_index,
            sensors: resolve_selection(&names).expect("test sensors must resolve"),
            poll_interval_secs: 30,
            validation: ValidationPolicy::Authoritative,
            setup_attempts: 1,
            setup_retry_delay_ms: 0,
            http_bind: "127.0.0.1:0".to_string(),
        }
    }

    fn battery_payload(charge: i64) -> Value {
        json!({"status": 0, "data": {"batteries": {"compartmentA": {"batteryCharging": charge}}}})
    }

    fn motor_payload(speed: i64) -> Value {
        json!({"status": 0, "data": {"isConnected": true, "nowSpeed": speed}})
    }

    fn overall_payload() -> Value {
        json!({"status": 0, "data": {"totalMileage": 1280.5}})
    }

    fn track_payload() -> Value {
        json!({"status": 0, "data": [{"ridingtime": 3661}]})
    }

    fn api_error() -> NiuClientError {
        NiuClientError::Api {
            status: 500,
            message: "backend unavailable".to_string(),
        }
    }

    fn reading(state: &SharedScooterState, name: &str) -> Option<Value> {
        state.lock().unwrap().reading(name)
    }

    #[test]
    fn successful_tick_publishes_enabled_readings() {
        let client = ScriptedClient::default()
            .push_battery(Ok(battery_payload(87)))
            .push_motor(Ok(motor_payload(21)))
            .push_overall(Ok(overall_payload()))
            .push_track(Ok(track_payload()));
        let config = test_config(&["BatteryCharge", "CurrentSpeed", "LastTrackRidingtime"], 0);
        let state = shared_state();
        let mut poller = ScooterPoller::preauthorized(
            client,
            &config,
            "tok-1".to_string(),
            "SNAAA".to_string(),
            state.clone(),
        );

        poller.tick().expect("tick should succeed");

        assert_eq!(reading(&state, "BatteryCharge"), Some(json!(87)));
        assert_eq!(reading(&state, "CurrentSpeed"), Some(json!(21)));
        assert_eq!(reading(&state, "LastTrackRidingtime"), Some(json!("01:01:01")));
        let locked = state.lock().unwrap();
        assert!(locked.authenticated);
        assert!(locked.last_refresh.is_some());
    }

    #[test]
    fn failed_category_retains_cached_snapshot_and_sibling_updates() {
        let client = ScriptedClient::default()
            .push_battery(Ok(battery_payload(87)))
            .push_battery(Err(api_error()))
            .push_motor(Ok(motor_payload(0)))
            .push_motor(Ok(motor_payload(25)))
            .push_overall(Ok(overall_payload()))
            .push_overall(Ok(overall_payload()))
            .push_track(Ok(track_payload()))
            .push_track(Ok(track_payload()));
        let config = test_config(&["BatteryCharge", "CurrentSpeed"], 0);
        let state = shared_state();
        let mut poller = ScooterPoller::preauthorized(
            client,
            &config,
            "tok-1".to_string(),
            "SNAAA".to_string(),
            state.clone(),
        );

        poller.tick().expect("first tick should succeed");
        // The battery fetch fails this cycle; the refresh still succeeds.
        poller.tick().expect("second tick should succeed");

        assert_eq!(reading(&state, "BatteryCharge"), Some(json!(87)));
        assert_eq!(reading(&state, "CurrentSpeed"), Some(json!(25)));
    }

    #[test]
    fn all_categories_failing_is_still_a_successful_refresh() {
        let client = ScriptedClient::default()
            .push_battery(Err(api_error()))
            .push_motor(Err(api_error()))
            .push_overall(Err(api_error()))
            .push_track(Err(api_error()));
        let config = test_config(&["BatteryCharge"], 0);
        let state = shared_state();
        let mut poller = ScooterPoller::preauthorized(
            client,
            &config,
            "tok-1".to_string(),
            "SNAAA".to_string(),
            state.clone(),
        );

        poller.tick().expect("tick should succeed despite telemetry failures");

        // Never fetched successfully: the reading is unavailable.
        assert_eq!(reading(&state, "BatteryCharge"), None);
        let locked = state.lock().unwrap();
        assert!(locked.authenticated);
        assert_eq!(locked.published.get("BatteryCharge"), Some(&None));
    }

    #[test]
    fn token_rejection_reauthenticates_and_preserves_the_serial() {
        let client = ScriptedClient::default()
            .push_battery(Err(NiuClientError::Auth("token expired".to_string())))
            .push_auth(Ok("tok-2".to_string()))
            .push_battery(Ok(battery_payload(90)))
            .push_motor(Ok(motor_payload(0)))
            .push_overall(Ok(overall_payload()))
            .push_track(Ok(track_payload()));
        let config = test_config(&["BatteryCharge"], 0);
        let state = shared_state();
        let mut poller = ScooterPoller::preauthorized(
            client,
            &config,
            "tok-1".to_string(),
            "SNAAA".to_string(),
            state.clone(),
        );

        let first = poller.tick();
        assert!(matches!(first, Err(PollError::TokenRejected(_))));
        assert!(!state.lock().unwrap().authenticated);

        // Next cycle re-authenticates; the vehicle list queue is empty,
        // so any serial re-resolution would panic the scripted client.
        poller.tick().expect("second tick should succeed");

        assert_eq!(reading(&state, "BatteryCharge"), Some(json!(90)));
        let locked = state.lock().unwrap();
        assert!(locked.authenticated);
        assert_eq!(locked.serial.as_deref(), Some("SNAAA"));
    }

    #[test]
    fn connection_failures_never_trigger_reauthentication() {
        // The auth queue is empty: an authenticate call would panic.
        let client = ScriptedClient::default()
            .push_battery(Err(api_error()))
            .push_motor(Err(api_error()))
            .push_overall(Err(api_error()))
            .push_track(Err(api_error()));
        let config = test_config(&["BatteryCharge"], 0);
        let state = shared_state();
        let mut poller = ScooterPoller::preauthorized(
            client,
            &config,
            "tok-1".to_string(),
            "SNAAA".to_string(),
            state.clone(),
        );

        poller.tick().expect("tick should succeed");
        assert!(state.lock().unwrap().authenticated);
    }

    #[test]
    fn out_of_range_index_during_resolution_is_fatal() {
        let client = ScriptedClient::default()
            .push_auth(Ok("tok-1".to_string()))
            .push_vehicles(Ok(vec![Vehicle {
                serial_number: "SNAAA".to_string(),
                name: "Commuter".to_string(),
            }]));
        let config = test_config(&["BatteryCharge"], 3);
        let state = shared_state();
        let mut poller = ScooterPoller::new(client, &config, state.clone());

        let first = poller.tick();
        assert!(matches!(first, Err(PollError::Fatal(_))));

        // Terminal: no further vendor calls happen (empty queues would
        // panic otherwise).
        let second = poller.tick();
        assert!(matches!(second, Err(PollError::Fatal(_))));
        assert!(state.lock().unwrap().failure.is_some());
    }

    #[test]
    fn implausible_reading_keeps_previous_published_value() {
        let client = ScriptedClient::default()
            .push_battery(Ok(battery_payload(87)))
            .push_battery(Ok(battery_payload(255)))
            .push_motor(Err(api_error()))
            .push_motor(Err(api_error()))
            .push_overall(Err(api_error()))
            .push_overall(Err(api_error()))
            .push_track(Err(api_error()))
            .push_track(Err(api_error()));
        let config = test_config(&["BatteryCharge"], 0);
        let state = shared_state();
        let mut poller = ScooterPoller::preauthorized(
            client,
            &config,
            "tok-1".to_string(),
            "SNAAA".to_string(),
            state.clone(),
        );

        poller.tick().expect("first tick should succeed");
        assert_eq!(reading(&state, "BatteryCharge"), Some(json!(87)));

        poller.tick().expect("second tick should succeed");
        assert_eq!(reading(&state, "BatteryCharge"), Some(json!(87)));
    }

    #[test]
    fn setup_resolves_the_configured_vehicle() {
        let client = ScriptedClient::default()
            .push_auth(Ok("tok-1".to_string()))
            .push_vehicles(Ok(vec![
                Vehicle {
                    serial_number: "SNAAA".to_string(),
                    name: "Commuter".to_string(),
                },
                Vehicle {
                    serial_number: "SNBBB".to_string(),
                    name: "Weekend".to_string(),
                },
            ]));
        let config = test_config(&["BatteryCharge"], 1);

        let outcome = validate_setup(&client, &config).expect("setup should succeed");

        assert_eq!(outcome.token, "tok-1");
        assert_eq!(outcome.serial, "SNBBB");
        assert_eq!(outcome.scooter_name, "Weekend");
    }

    #[test]
    fn setup_rejects_out_of_range_index_without_retrying() {
        let client = ScriptedClient::default()
            .push_auth(Ok("tok-1".to_string()))
            .push_vehicles(Ok(vec![Vehicle {
                serial_number: "SNAAA".to_string(),
                name: "Commuter".to_string(),
            }]));
        let mut config = test_config(&["BatteryCharge"], 1);
        config.setup_attempts = 3;

        let result = validate_setup(&client, &config);

        match result {
            Err(AppError::Config(message)) => {
                assert_eq!(message, "scooter index 1 out of range (1 vehicles)");
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn setup_retries_transient_failures() {
        let client = ScriptedClient::default()
            .push_auth(Err(NiuClientError::Payload("status field missing")))
            .push_auth(Ok("tok-1".to_string()))
            .push_vehicles(Ok(vec![Vehicle {
                serial_number: "SNAAA".to_string(),
                name: "Commuter".to_string(),
            }]));
        let mut config = test_config(&["BatteryCharge"], 0);
        config.setup_attempts = 2;

        let outcome = validate_setup(&client, &config).expect("setup should succeed on retry");
        assert_eq!(outcome.serial, "SNAAA");
    }

    #[test]
    fn setup_maps_auth_failure_to_invalid_authentication() {
        let client = ScriptedClient::default()
            .push_auth(Err(NiuClientError::Auth("bad credentials".to_string())))
            .push_auth(Err(NiuClientError::Auth("bad credentials".to_string())));
        let mut config = test_config(&["BatteryCharge"], 0);
        config.setup_attempts = 2;

        let result = validate_setup(&client, &config);

        assert_eq!(
            result.unwrap_err().to_string(),
            "setup failed: invalid authentication"
        );
    }
}
