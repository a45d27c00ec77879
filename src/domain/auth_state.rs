/// Authentication lifecycle of the polling coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollPhase {
    Unauthenticated,
    Authenticated { token: String },
    Failed { reason: String },
}

/// Token and vehicle identity owned by one coordinator instance.
///
/// The serial number lives outside the phase: dropping the token on an
/// auth-class failure must not lose the resolved vehicle, which is only
/// re-resolved when it was never known.
#[derive(Debug)]
pub struct AuthState {
    phase: PollPhase,
    serial: Option<String>,
}

impl AuthState {
    pub fn new() -> Self {
        Self {
            phase: PollPhase::Unauthenticated,
            serial: None,
        }
    }

    /// Seeds the state from a setup-time validation that already holds a
    /// token and a resolved serial.
    pub fn preauthorized(token: String, serial: String) -> Self {
        Self {
            phase: PollPhase::Authenticated { token },
            serial: Some(serial),
        }
    }

    pub fn token(&self) -> Option<&str> {
        match &self.phase {
            PollPhase::Authenticated { token } => Some(token),
            _ => None,
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn needs_authentication(&self) -> bool {
        self.phase == PollPhase::Unauthenticated
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.phase, PollPhase::Failed { .. })
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.phase {
            PollPhase::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn on_authenticated(&mut self, token: String) {
        self.phase = PollPhase::Authenticated { token };
    }

    pub fn on_serial_resolved(&mut self, serial: String) {
        self.serial = Some(serial);
    }

    /// Any auth-class failure discards the token and only the token.
    pub fn on_auth_error(&mut self) {
        self.phase = PollPhase::Unauthenticated;
    }

    /// Terminal: a configuration error discovered while polling.
    pub fn on_fatal(&mut self, reason: String) {
        self.phase = PollPhase::Failed { reason };
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}
