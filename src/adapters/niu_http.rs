use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Response;
use serde_json::Value;
use thiserror::Error;

pub const ACCOUNT_BASE_URL: &str = "https://account.niu.com";
pub const API_BASE_URL: &str = "https://app-api.niu.com";

const LOGIN_PATH: &str = "/v3/api/oauth2/token";
const VEHICLE_LIST_PATH: &str = "/v5/scooter/list";
const BATTERY_INFO_PATH: &str = "/v3/motor_data/battery_info";
const MOTOR_INDEX_PATH: &str = "/v5/scooter/motor_data/index_info";
const OVERALL_TALLY_PATH: &str = "/motoinfo/overallTally";
const TRACK_LIST_PATH: &str = "/v5/track/list/v2";

const REQUEST_TIMEOUT_SECONDS: u64 = 30;
const APP_ID: &str = "niu_ktdrr960";

// The backend rejects clients it does not recognize; these fingerprints
// must go out verbatim.
const MOTOR_DATA_USER_AGENT: &str = "manager/4.6.48 (android; IN2020 11);lang=zh-CN;clientIdentifier=Domestic;timezone=Asia/Shanghai;model=IN2020;deviceName=IN2020;ostype=android";
const TRACK_USER_AGENT: &str = "manager/1.0.0 (identifier);clientIdentifier=identifier";

// Application-level status values that mean the token is no longer valid.
const TOKEN_REJECTED_STATUSES: &[i64] = &[1131, 1132];

pub trait NiuClient: Send + Sync + 'static {
    fn authenticate(&self, username: &str, password: &str) -> Result<String, NiuClientError>;
    fn list_vehicles(&self, token: &str) -> Result<Vec<Vehicle>, NiuClientError>;
    fn battery_info(&self, serial: &str, token: &str) -> Result<Value, NiuClientError>;
    fn motor_info(&self, serial: &str, token: &str) -> Result<Value, NiuClientError>;
    fn overall_info(&self, serial: &str, token: &str) -> Result<Value, NiuClientError>;
    fn track_info(&self, serial: &str, token: &str) -> Result<Value, NiuClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    pub serial_number: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum NiuClientError {
    #[error("transport failure: {0}")]
    Connection(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("api rejected the request (status {status}): {message}")]
    Api { status: i64, message: String },
    #[error("unexpected response shape: {0}")]
    Payload(&'static str),
}

impl NiuClientError {
    /// Auth-class errors force the coordinator to discard its token.
    pub fn is_auth(&self) -> bool {
        matches!(self, NiuClientError::Auth(_))
    }
}

#[derive(Debug, Clone)]
pub struct NiuHttpClient {
    http: reqwest::blocking::Client,
    account_base: String,
    api_base: String,
}

impl NiuHttpClient {
    pub fn new() -> Result<Self, NiuClientError> {
        Self::with_base_urls(ACCOUNT_BASE_URL, API_BASE_URL)
    }

    pub fn with_base_urls(account_base: &str, api_base: &str) -> Result<Self, NiuClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            http,
            account_base: account_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn telemetry_get(
        &self,
        path: &str,
        serial: &str,
        token: &str,
        user_agent: Option<&str>,
    ) -> Result<Value, NiuClientError> {
        let mut request = self
            .http
            .get(format!("{}{path}", self.api_base))
            .query(&[("sn", serial)])
            .header("token", token);
        if let Some(agent) = user_agent {
            request = request.header("user-agent", agent);
        }

        check_application_status(into_json(request.send()?)?)
    }

    fn telemetry_post(
        &self,
        path: &str,
        token: &str,
        body: &Value,
        user_agent: Option<&str>,
    ) -> Result<Value, NiuClientError> {
        let mut request = self
            .http
            .post(format!("{}{path}", self.api_base))
            .header("token", token)
            .header("Accept-Language", "en-US")
            .json(body);
        if let Some(agent) = user_agent {
            request = request.header("user-agent", agent);
        }

        check_application_status(into_json(request.send()?)?)
    }
}

impl NiuClient for NiuHttpClient {
    fn authenticate(&self, username: &str, password: &str) -> Result<String, NiuClientError> {
        // The vendor exchanges the MD5 hex digest of the password, never
        // the password itself. Weak, but fixed by the wire contract.
        let digest = format!("{:x}", md5::compute(password.as_bytes()));
        let form = [
            ("account", username),
            ("password", digest.as_str()),
            ("grant_type", "password"),
            ("scope", "base"),
            ("app_id", APP_ID),
        ];

        let response = self
            .http
            .post(format!("{}{LOGIN_PATH}", self.account_base))
            .form(&form)
            .send()?;
        let payload = into_json(response)?;

        payload
            .get("data")
            .and_then(|data| data.get("token"))
            .and_then(|token| token.get("access_token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| NiuClientError::Auth("token missing from response".to_string()))
    }

    fn list_vehicles(&self, token: &str) -> Result<Vec<Vehicle>, NiuClientError> {
        let response = self
            .http
            .get(format!("{}{VEHICLE_LIST_PATH}", self.api_base))
            .header("token", token)
            .send()?;
        let payload = into_json(response)?;

        let items = payload
            .get("data")
            .and_then(|data| data.get("items"))
            .and_then(Value::as_array)
            .ok_or(NiuClientError::Payload("vehicle list missing data.items"))?;

        // The caller selects by position, so every slot must be kept.
        items
            .iter()
            .map(|item| {
                let serial_number = item
                    .get("sn_id")
                    .and_then(Value::as_str)
                    .ok_or(NiuClientError::Payload("vehicle entry missing sn_id"))?
                    .to_string();
                let name = item
                    .get("scooter_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(Vehicle {
                    serial_number,
                    name,
                })
            })
            .collect()
    }

    fn battery_info(&self, serial: &str, token: &str) -> Result<Value, NiuClientError> {
        self.telemetry_get(BATTERY_INFO_PATH, serial, token, Some(MOTOR_DATA_USER_AGENT))
    }

    fn motor_info(&self, serial: &str, token: &str) -> Result<Value, NiuClientError> {
        self.telemetry_get(MOTOR_INDEX_PATH, serial, token, Some(MOTOR_DATA_USER_AGENT))
    }

    fn overall_info(&self, serial: &str, token: &str) -> Result<Value, NiuClientError> {
        self.telemetry_post(
            OVERALL_TALLY_PATH,
            token,
            &serde_json::json!({ "sn": serial }),
            None,
        )
    }

    fn track_info(&self, serial: &str, token: &str) -> Result<Value, NiuClientError> {
        self.telemetry_post(
            TRACK_LIST_PATH,
            token,
            &serde_json::json!({ "index": "0", "pagesize": 10, "sn": serial }),
            Some(TRACK_USER_AGENT),
        )
    }
}

fn into_json(response: Response) -> Result<Value, NiuClientError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(NiuClientError::Auth(format!("http status {status}")));
    }

    let response = response.error_for_status()?;
    Ok(response.json::<Value>()?)
}

fn check_application_status(payload: Value) -> Result<Value, NiuClientError> {
    let Some(status) = payload.get("status").and_then(Value::as_i64) else {
        return Err(NiuClientError::Payload("status field missing"));
    };

    if status == 0 {
        return Ok(payload);
    }

    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();

    if TOKEN_REJECTED_STATUSES.contains(&status) {
        return Err(NiuClientError::Auth(message));
    }

    Err(NiuClientError::Api { status, message })
}
