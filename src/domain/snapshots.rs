use chrono::DateTime;
use serde_json::Value;

// The vendor returns thumbnail URLs on an internal CDN host that is not
// reachable from outside; the public API host serves the same paths.
const INTERNAL_THUMB_HOST: &str = "app-api.niucache.com";
const PUBLIC_THUMB_HOST: &str = "app-api.niu.com";

/// One of the four independently fetched telemetry payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryCategory {
    Battery,
    Motor,
    Overall,
    Track,
}

impl TelemetryCategory {
    pub const ALL: [TelemetryCategory; 4] = [
        TelemetryCategory::Battery,
        TelemetryCategory::Motor,
        TelemetryCategory::Overall,
        TelemetryCategory::Track,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TelemetryCategory::Battery => "battery",
            TelemetryCategory::Motor => "motor",
            TelemetryCategory::Overall => "overall",
            TelemetryCategory::Track => "track",
        }
    }
}

/// Latest successfully fetched payload per telemetry category.
///
/// Snapshots are only ever replaced whole; a failed fetch leaves the
/// previous payload for that category untouched and never affects the
/// siblings.
#[derive(Debug, Default, Clone)]
pub struct SnapshotCache {
    battery: Option<Value>,
    motor: Option<Value>,
    overall: Option<Value>,
    track: Option<Value>,
}

impl SnapshotCache {
    pub fn replace(&mut self, category: TelemetryCategory, payload: Value) {
        match category {
            TelemetryCategory::Battery => self.battery = Some(payload),
            TelemetryCategory::Motor => self.motor = Some(payload),
            TelemetryCategory::Overall => self.overall = Some(payload),
            TelemetryCategory::Track => self.track = Some(payload),
        }
    }

    pub fn has(&self, category: TelemetryCategory) -> bool {
        self.payload(category).is_some()
    }

    fn payload(&self, category: TelemetryCategory) -> Option<&Value> {
        match category {
            TelemetryCategory::Battery => self.battery.as_ref(),
            TelemetryCategory::Motor => self.motor.as_ref(),
            TelemetryCategory::Overall => self.overall.as_ref(),
            TelemetryCategory::Track => self.track.as_ref(),
        }
    }

    /// `data.batteries.compartmentA.<field>` of the battery payload.
    pub fn battery_field(&self, field: &str) -> Option<Value> {
        self.battery
            .as_ref()?
            .get("data")?
            .get("batteries")?
            .get("compartmentA")?
            .get(field)
            .cloned()
    }

    /// `data.<field>` of the motor payload.
    pub fn motor_field(&self, field: &str) -> Option<Value> {
        self.motor.as_ref()?.get("data")?.get(field).cloned()
    }

    /// `data.lastTrack.<field>` of the motor payload.
    pub fn distance_field(&self, field: &str) -> Option<Value> {
        self.motor
            .as_ref()?
            .get("data")?
            .get("lastTrack")?
            .get(field)
            .cloned()
    }

    /// `data.postion.<field>` of the motor payload. The vendor really
    /// spells the key `postion`.
    pub fn position_field(&self, field: &str) -> Option<Value> {
        self.motor
            .as_ref()?
            .get("data")?
            .get("postion")?
            .get(field)
            .cloned()
    }

    /// Raw reported position as `(longitude, latitude)`, still in the
    /// vendor reference frame.
    pub fn position_pair(&self) -> Option<(f64, f64)> {
        let longitude = self.position_field("lng")?.as_f64()?;
        let latitude = self.position_field("lat")?.as_f64()?;
        Some((longitude, latitude))
    }

    /// `data.<field>` of the overall/tally payload.
    pub fn overall_field(&self, field: &str) -> Option<Value> {
        self.overall.as_ref()?.get("data")?.get(field).cloned()
    }

    /// `data[0].<field>` of the track payload (newest track first), with
    /// the read-time renderings the presentation layer expects.
    pub fn track_field(&self, field: &str) -> Option<Value> {
        let newest = self.track.as_ref()?.get("data")?.get(0)?;

        match field {
            "startTime" | "endTime" => {
                let millis = newest.get(field)?.as_i64()?;
                format_epoch_millis(millis).map(Value::String)
            }
            "ridingtime" => {
                let seconds = newest.get(field)?.as_i64()?;
                format_duration_seconds(seconds).map(Value::String)
            }
            "track_thumb" => {
                let url = newest.get(field)?.as_str()?;
                Some(Value::String(rewrite_thumb_host(url)))
            }
            _ => newest.get(field).cloned(),
        }
    }
}

fn format_epoch_millis(millis: i64) -> Option<String> {
    let datetime = DateTime::from_timestamp_millis(millis)?;
    Some(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
}

// Renders like the vendor app: wall-clock within a day, wrapping at 24h.
fn format_duration_seconds(seconds: i64) -> Option<String> {
    if seconds < 0 {
        return None;
    }
    let hours = (seconds / 3600) % 24;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    Some(format!("{hours:02}:{minutes:02}:{secs:02}"))
}

fn rewrite_thumb_host(url: &str) -> String {
    url.replace(INTERNAL_THUMB_HOST, PUBLIC_THUMB_HOST)
}
