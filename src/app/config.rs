use crate::app::AppError;
use crate::domain::readings::ValidationPolicy;
use crate::domain::sensor_catalog::{self, SensorDescriptor};

#[derive(Clone)]
pub struct AppConfig {
    pub username: String,
    pub password: String,
    pub scooter_index: usize,
    pub sensors: Vec<&'static SensorDescriptor>,
    pub poll_interval_secs: u64,
    pub validation: ValidationPolicy,
    pub setup_attempts: u32,
    pub setup_retry_delay_ms: u64,
    pub http_bind: String,
}

// Manual Debug: credentials must never end up in logs, not even via {:?}.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("scooter_index", &self.scooter_index)
            .field("sensors", &self.sensors.len())
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("validation", &self.validation)
            .field("setup_attempts", &self.setup_attempts)
            .field("setup_retry_delay_ms", &self.setup_retry_delay_ms)
            .field("http_bind", &self.http_bind)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = required(&lookup, "NIU_USERNAME")?;
        let password = required(&lookup, "NIU_PASSWORD")?;

        let sensor_names: Vec<String> = match lookup("NIU_SENSORS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            None => sensor_catalog::DEFAULT_SENSORS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        };
        let sensors = sensor_catalog::resolve_selection(&sensor_names).map_err(AppError::config)?;

        let validation = match lookup("NIU_VALIDATION").as_deref().map(str::trim) {
            None | Some("authoritative") => ValidationPolicy::Authoritative,
            Some("advisory") => ValidationPolicy::Advisory,
            Some(other) => {
                return Err(AppError::config(format!(
                    "NIU_VALIDATION must be authoritative or advisory, got {other}"
                )));
            }
        };

        Ok(Self {
            username,
            password,
            scooter_index: parse_or_default(&lookup, "NIU_SCOOTER_INDEX", 0_usize)?,
            sensors,
            poll_interval_secs: parse_or_default(&lookup, "NIU_POLL_INTERVAL_SECS", 30_u64)?,
            validation,
            setup_attempts: parse_or_default(&lookup, "NIU_SETUP_ATTEMPTS", 3_u32)?,
            setup_retry_delay_ms: parse_or_default(&lookup, "NIU_SETUP_RETRY_DELAY_MS", 2000_u64)?,
            http_bind: lookup("HTTP_BIND")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
