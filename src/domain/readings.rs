use std::collections::HashMap;

use serde_json::{Value, json};

use crate::domain::geo;
use crate::domain::sensor_catalog::{SensorCategory, SensorDescriptor};
use crate::domain::snapshots::SnapshotCache;

/// Whether plausibility validation gates what gets displayed or only logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPolicy {
    Authoritative,
    Advisory,
}

/// Projects a descriptor onto the current snapshots. `None` means the
/// reading is unavailable: the snapshot was never fetched or the field
/// path is missing.
pub fn project(cache: &SnapshotCache, descriptor: &SensorDescriptor) -> Option<Value> {
    match descriptor.category {
        SensorCategory::Battery => cache.battery_field(descriptor.source_field),
        SensorCategory::Motor => cache.motor_field(descriptor.source_field),
        SensorCategory::Distance => cache.distance_field(descriptor.source_field),
        SensorCategory::Position => project_position(cache, descriptor.source_field),
        SensorCategory::Overall => cache.overall_field(descriptor.source_field),
        SensorCategory::Track => cache.track_field(descriptor.source_field),
    }
}

// Position readings leave the vendor reference frame before display.
fn project_position(cache: &SnapshotCache, field: &str) -> Option<Value> {
    let (longitude, latitude) = cache.position_pair()?;
    let (longitude, latitude) = geo::to_display_frame(longitude, latitude);
    match field {
        "lng" => Some(json!(longitude)),
        "lat" => Some(json!(latitude)),
        _ => cache.position_field(field),
    }
}

/// Per-sensor plausibility gate. An implausible fresh value keeps the
/// previously accepted value on display instead of propagating the
/// outlier; with the advisory policy it is only logged.
#[derive(Debug)]
pub struct ReadingGate {
    policy: ValidationPolicy,
    accepted: HashMap<&'static str, Value>,
}

impl ReadingGate {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self {
            policy,
            accepted: HashMap::new(),
        }
    }

    pub fn admit(
        &mut self,
        descriptor: &SensorDescriptor,
        fresh: Option<Value>,
    ) -> Option<Value> {
        let value = fresh?;

        if let Some(number) = value.as_f64()
            && let Some((min, max)) = plausible_range(descriptor.source_field)
            && !(min..=max).contains(&number)
        {
            tracing::warn!(
                sensor = descriptor.name,
                value = number,
                min,
                max,
                "implausible reading"
            );
            if self.policy == ValidationPolicy::Authoritative {
                return self.accepted.get(descriptor.name).cloned();
            }
        }

        self.accepted.insert(descriptor.name, value.clone());
        Some(value)
    }
}

fn plausible_range(field: &str) -> Option<(f64, f64)> {
    match field {
        "batteryCharging" | "gradeBattery" | "centreCtrlBattery" => Some((0.0, 100.0)),
        "lng" | "lat" => Some((-180.0, 180.0)),
        "temperature" => Some((-40.0, 80.0)),
        _ => None,
    }
}

/// The cross-snapshot attribute bundle carried by the motor-connectivity
/// sensors. Missing fields degrade one by one to documented sentinels,
/// never failing the bundle as a whole.
pub fn connectivity_attributes(cache: &SnapshotCache) -> Value {
    let (longitude, latitude) = cache
        .position_pair()
        .map(|(lng, lat)| geo::to_display_frame(lng, lat))
        .unwrap_or((0.0, 0.0));

    json!({
        "bmsId": cache.battery_field("bmsId").unwrap_or(json!("N/A")),
        "latitude": latitude,
        "longitude": longitude,
        "gsm": cache.motor_field("gsm").unwrap_or(json!("N/A")),
        "gps": cache.motor_field("gps").unwrap_or(json!("N/A")),
        "time": cache.distance_field("time").unwrap_or(json!(0)),
        "range": cache.motor_field("estimatedMileage").unwrap_or(json!(0)),
        "battery": cache.battery_field("batteryCharging").unwrap_or(json!(0)),
        "battery_grade": cache.battery_field("gradeBattery").unwrap_or(json!(0)),
        "centre_ctrl_batt": cache.motor_field("centreCtrlBattery").unwrap_or(json!(0.0)),
    })
}
