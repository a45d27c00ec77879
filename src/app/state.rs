use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::snapshots::SnapshotCache;

/// Mutable scooter state shared between the poller thread and the read
/// API. Only the poller writes; everything else takes read-only looks.
#[derive(Debug, Default)]
pub struct ScooterState {
    pub snapshots: SnapshotCache,
    pub published: HashMap<&'static str, Option<Value>>,
    pub serial: Option<String>,
    pub scooter_name: Option<String>,
    pub authenticated: bool,
    pub failure: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl ScooterState {
    /// Latest published reading for a sensor; `None` means unavailable.
    pub fn reading(&self, name: &str) -> Option<Value> {
        self.published.get(name).cloned().flatten()
    }
}

pub type SharedScooterState = Arc<Mutex<ScooterState>>;

pub fn shared_state() -> SharedScooterState {
    Arc::new(Mutex::new(ScooterState::default()))
}
