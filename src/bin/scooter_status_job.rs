use std::thread;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use niu_scooter_api::adapters::niu_http::{NiuClient, NiuHttpClient};
use niu_scooter_api::domain::geo;
use niu_scooter_api::domain::snapshots::{SnapshotCache, TelemetryCategory};

const POLL_INTERVAL: Duration = Duration::from_secs(30);

fn main() {
    let username = required_env("NIU_USERNAME");
    let password = required_env("NIU_PASSWORD");
    let scooter_index: usize = std::env::var("NIU_SCOOTER_INDEX")
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(0);

    let client = match NiuHttpClient::new() {
        Ok(client) => client,
        Err(err) => {
            println!("[{}] ERROR: http client setup failed: {err}", now_iso());
            std::process::exit(1);
        }
    };

    println!(
        "[{}] starting scooter status job (interval: {}s, scooter index: {scooter_index})",
        now_iso(),
        POLL_INTERVAL.as_secs()
    );

    let mut token: Option<String> = None;
    let mut serial: Option<String> = None;

    loop {
        if token.is_none() {
            match client.authenticate(&username, &password) {
                Ok(fresh) => token = Some(fresh),
                Err(err) => {
                    println!("[{}] authentication failed: {err}", now_iso());
                    thread::sleep(POLL_INTERVAL);
                    continue;
                }
            }
        }
        let Some(current_token) = token.clone() else {
            continue;
        };

        if serial.is_none() {
            match client.list_vehicles(&current_token) {
                Ok(vehicles) => match vehicles.get(scooter_index) {
                    Some(vehicle) => {
                        println!(
                            "[{}] vehicle resolved: {} ({})",
                            now_iso(),
                            vehicle.name,
                            vehicle.serial_number
                        );
                        serial = Some(vehicle.serial_number.clone());
                    }
                    None => {
                        println!(
                            "[{}] ERROR: scooter index {scooter_index} out of range ({} vehicles)",
                            now_iso(),
                            vehicles.len()
                        );
                        std::process::exit(2);
                    }
                },
                Err(err) => {
                    if err.is_auth() {
                        token = None;
                    }
                    println!("[{}] vehicle list failed: {err}", now_iso());
                    thread::sleep(POLL_INTERVAL);
                    continue;
                }
            }
        }
        let Some(current_serial) = serial.clone() else {
            continue;
        };

        let mut cache = SnapshotCache::default();
        let fetches: [(TelemetryCategory, Result<Value, _>); 4] = [
            (
                TelemetryCategory::Battery,
                client.battery_info(&current_serial, &current_token),
            ),
            (
                TelemetryCategory::Motor,
                client.motor_info(&current_serial, &current_token),
            ),
            (
                TelemetryCategory::Overall,
                client.overall_info(&current_serial, &current_token),
            ),
            (
                TelemetryCategory::Track,
                client.track_info(&current_serial, &current_token),
            ),
        ];

        let mut token_rejected = false;
        for (category, result) in fetches {
            match result {
                Ok(payload) => cache.replace(category, payload),
                Err(err) => {
                    if err.is_auth() {
                        token_rejected = true;
                    }
                    println!(
                        "[{}] {} fetch failed: {err}",
                        now_iso(),
                        category.as_str()
                    );
                }
            }
        }
        if token_rejected {
            token = None;
        }

        println!(
            "[{}] {current_serial}: battery {}%, connected {}, speed {} km/h, range {} km, mileage {} km, position {}",
            now_iso(),
            field(cache.battery_field("batteryCharging")),
            field(cache.motor_field("isConnected")),
            field(cache.motor_field("nowSpeed")),
            field(cache.motor_field("estimatedMileage")),
            field(cache.overall_field("totalMileage")),
            position(&cache),
        );

        thread::sleep(POLL_INTERVAL);
    }
}

fn required_env(key: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => {
            println!("[{}] ERROR: {key} must be set", now_iso());
            std::process::exit(2);
        }
    }
}

fn field(value: Option<Value>) -> String {
    match value {
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
        None => "-".to_string(),
    }
}

fn position(cache: &SnapshotCache) -> String {
    match cache.position_pair() {
        Some((longitude, latitude)) => {
            let (longitude, latitude) = geo::to_display_frame(longitude, latitude);
            format!("{latitude:.5},{longitude:.5}")
        }
        None => "-".to_string(),
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
