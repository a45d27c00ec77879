use actix_web::{HttpResponse, Responder, get, web};
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;

use crate::app::state::{ScooterState, SharedScooterState};
use crate::domain::readings::connectivity_attributes;
use crate::domain::sensor_catalog::SensorDescriptor;
use crate::domain::snapshots::TelemetryCategory;

#[derive(Clone)]
pub struct ApiState {
    pub state: SharedScooterState,
    pub sensors: Vec<&'static SensorDescriptor>,
    pub scooter_index: usize,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorEntityResponse {
    pub name: String,
    pub unique_id: String,
    pub display_name_zh: String,
    pub value: Option<Value>,
    pub available: bool,
    pub unit: String,
    pub icon: String,
    pub device_class: Option<String>,
    pub state_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPresence {
    pub battery: bool,
    pub motor: bool,
    pub overall: bool,
    pub track: bool,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub authenticated: bool,
    pub failure: Option<String>,
    pub serial: Option<String>,
    pub scooter_name: Option<String>,
    pub snapshots: SnapshotPresence,
    pub last_refresh: Option<String>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(list_sensors_endpoint)
        .service(get_sensor_endpoint)
        .service(get_status_endpoint);
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/sensors")]
async fn list_sensors_endpoint(state: web::Data<ApiState>) -> impl Responder {
    let locked = match state.state.lock() {
        Ok(locked) => locked,
        Err(_) => return lock_poisoned_response(),
    };

    let entities: Vec<SensorEntityResponse> = state
        .sensors
        .iter()
        .map(|descriptor| build_entity(&locked, descriptor, state.scooter_index))
        .collect();

    HttpResponse::Ok().json(entities)
}

#[get("/sensors/{name}")]
async fn get_sensor_endpoint(
    state: web::Data<ApiState>,
    name: web::Path<String>,
) -> impl Responder {
    let Some(descriptor) = state
        .sensors
        .iter()
        .find(|descriptor| descriptor.name == name.as_str())
    else {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("sensor {name} is not enabled")
        }));
    };

    let locked = match state.state.lock() {
        Ok(locked) => locked,
        Err(_) => return lock_poisoned_response(),
    };

    HttpResponse::Ok().json(build_entity(&locked, descriptor, state.scooter_index))
}

#[get("/status")]
async fn get_status_endpoint(state: web::Data<ApiState>) -> impl Responder {
    let locked = match state.state.lock() {
        Ok(locked) => locked,
        Err(_) => return lock_poisoned_response(),
    };

    HttpResponse::Ok().json(StatusResponse {
        authenticated: locked.authenticated,
        failure: locked.failure.clone(),
        serial: locked.serial.clone(),
        scooter_name: locked.scooter_name.clone(),
        snapshots: SnapshotPresence {
            battery: locked.snapshots.has(TelemetryCategory::Battery),
            motor: locked.snapshots.has(TelemetryCategory::Motor),
            overall: locked.snapshots.has(TelemetryCategory::Overall),
            track: locked.snapshots.has(TelemetryCategory::Track),
        },
        last_refresh: locked
            .last_refresh
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    })
}

fn build_entity(
    state: &ScooterState,
    descriptor: &SensorDescriptor,
    scooter_index: usize,
) -> SensorEntityResponse {
    let value = state.reading(descriptor.name);
    let attributes = descriptor
        .has_attribute_bundle()
        .then(|| connectivity_attributes(&state.snapshots));

    SensorEntityResponse {
        name: descriptor.name.to_string(),
        unique_id: format!("niu_scooter_{scooter_index}_{}", descriptor.entity_suffix),
        display_name_zh: descriptor.display_name_zh.to_string(),
        available: value.is_some(),
        value,
        unit: descriptor.unit.to_string(),
        icon: descriptor.icon.to_string(),
        device_class: descriptor
            .device_class
            .map(|class| class.as_str().to_string()),
        state_class: descriptor
            .state_class
            .map(|class| class.as_str().to_string()),
        attributes,
    }
}

fn lock_poisoned_response() -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": "state lock poisoned"
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, body::to_bytes, http::StatusCode, test, web};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use crate::app::state::shared_state;
    use crate::domain::sensor_catalog::descriptor;
    use crate::domain::snapshots::TelemetryCategory;

    use super::{ApiState, configure_routes};

    fn sample_state() -> ApiState {
        let shared = shared_state();
        {
            let mut locked = shared.lock().expect("state lock");
            locked.snapshots.replace(
                TelemetryCategory::Battery,
                json!({"status": 0, "data": {"batteries": {"compartmentA": {
                    "batteryCharging": 87, "bmsId": "BMSA001"
                }}}}),
            );
            locked.published.insert("BatteryCharge", Some(json!(87)));
            locked.published.insert("Isconnected", None);
            locked.serial = Some("SNAAA".to_string());
            locked.scooter_name = Some("Commuter".to_string());
            locked.authenticated = true;
            locked.last_refresh = Some(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
        }

        ApiState {
            state: shared,
            sensors: vec![
                descriptor("BatteryCharge").unwrap(),
                descriptor("Isconnected").unwrap(),
            ],
            scooter_index: 0,
        }
    }

    #[actix_web::test]
    async fn health_endpoint_returns_ok() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sample_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn sensors_endpoint_lists_enabled_entities() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sample_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/sensors").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body()).await.expect("body");
        let parsed: serde_json::Value = serde_json::from_slice(&body).expect("json");
        let items = parsed.as_array().expect("array");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "BatteryCharge");
        assert_eq!(items[0]["uniqueId"], "niu_scooter_0_battery_charge");
        assert_eq!(items[0]["value"], json!(87));
        assert_eq!(items[0]["available"], json!(true));
        assert_eq!(items[0]["unit"], "%");
        assert_eq!(items[0]["deviceClass"], "battery");
        assert!(items[0].get("attributes").is_none());
    }

    #[actix_web::test]
    async fn unavailable_sensor_serializes_null_value() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sample_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/sensors/Isconnected")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body()).await.expect("body");
        let parsed: serde_json::Value = serde_json::from_slice(&body).expect("json");

        assert_eq!(parsed["value"], serde_json::Value::Null);
        assert_eq!(parsed["available"], json!(false));
        // Connectivity sensors expose the attribute bundle even while the
        // reading itself is unavailable; missing fields hold sentinels.
        assert_eq!(parsed["attributes"]["bmsId"], "BMSA001");
        assert_eq!(parsed["attributes"]["gsm"], "N/A");
        assert_eq!(parsed["attributes"]["latitude"], json!(0.0));
    }

    #[actix_web::test]
    async fn unknown_sensor_returns_404() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sample_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/sensors/TimesCharged")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn status_endpoint_reports_snapshot_presence() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sample_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/status").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body()).await.expect("body");
        let parsed: serde_json::Value = serde_json::from_slice(&body).expect("json");

        assert_eq!(parsed["authenticated"], json!(true));
        assert_eq!(parsed["serial"], "SNAAA");
        assert_eq!(parsed["scooterName"], "Commuter");
        assert_eq!(parsed["snapshots"]["battery"], json!(true));
        assert_eq!(parsed["snapshots"]["motor"], json!(false));
        assert_eq!(parsed["lastRefresh"], "2023-11-14T22:13:20.000Z");
    }
}
