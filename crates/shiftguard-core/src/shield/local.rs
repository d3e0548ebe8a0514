use std::collections::BTreeSet;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{
    AppToken, ShieldAdapter, ShieldEvent, ShieldEventBus, ShieldEventKind, ShieldOperation,
    ShieldSubscription, WorkSchedule,
};
use crate::error::ShieldError;

/// Persistable state of a [`LocalShield`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalShieldState {
    #[serde(default)]
    pub authorized: bool,
    /// Tokens the picker offers.
    #[serde(default)]
    pub available: BTreeSet<AppToken>,
    /// Tokens last picked.
    #[serde(default)]
    pub selection: BTreeSet<AppToken>,
    #[serde(default)]
    pub armed: Option<WorkSchedule>,
}

/// In-process shield platform.
///
/// Behaves like the OS capability would (consent gate, arm/disarm,
/// attempt/bypass events) without touching the OS. Used by the CLI and tests.
#[derive(Debug)]
pub struct LocalShield {
    enabled: bool,
    grants_consent: bool,
    state: Mutex<LocalShieldState>,
    history: Mutex<Vec<ShieldOperation>>,
    bus: ShieldEventBus,
}

impl LocalShield {
    pub fn new(enabled: bool) -> Self {
        Self::from_state(enabled, LocalShieldState::default())
    }

    pub fn from_state(enabled: bool, state: LocalShieldState) -> Self {
        Self {
            enabled,
            grants_consent: true,
            state: Mutex::new(state),
            history: Mutex::new(Vec::new()),
            bus: ShieldEventBus::new(),
        }
    }

    /// Simulate a worker who declines the consent prompt.
    pub fn denying_consent(mut self) -> Self {
        self.grants_consent = false;
        self
    }

    pub fn with_available(self, tokens: impl IntoIterator<Item = AppToken>) -> Self {
        self.lock().available.extend(tokens);
        self
    }

    pub fn snapshot(&self) -> LocalShieldState {
        self.lock().clone()
    }

    pub fn is_armed(&self) -> bool {
        self.lock().armed.is_some()
    }

    pub fn is_authorized(&self) -> bool {
        self.lock().authorized
    }

    /// Platform operations that took effect, in order.
    pub fn history(&self) -> Vec<ShieldOperation> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Report that the worker tried to open a restricted app.
    pub fn simulate_attempt(&self, app_token: Option<AppToken>) -> usize {
        self.bus
            .publish(ShieldEvent::new(ShieldEventKind::Attempt, app_token, Utc::now()))
    }

    /// Report a grace period granted by the platform.
    pub fn simulate_grace(&self, app_token: Option<AppToken>) -> usize {
        self.bus
            .publish(ShieldEvent::new(ShieldEventKind::Grace, app_token, Utc::now()))
    }

    pub fn event_bus(&self) -> &ShieldEventBus {
        &self.bus
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocalShieldState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn note(&self, op: ShieldOperation) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(op);
    }
}

impl ShieldAdapter for LocalShield {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn request_authorization(&self) -> Result<bool, ShieldError> {
        if !self.enabled {
            return Ok(true);
        }
        let mut state = self.lock();
        state.authorized = state.authorized || self.grants_consent;
        Ok(state.authorized)
    }

    fn pick_applications_and_categories(&self) -> Result<BTreeSet<AppToken>, ShieldError> {
        if !self.enabled {
            return Ok(BTreeSet::new());
        }
        let mut state = self.lock();
        state.selection = state.available.clone();
        Ok(state.selection.clone())
    }

    fn start_work_limit(&self, schedule: &WorkSchedule) -> Result<(), ShieldError> {
        if !self.enabled {
            return Ok(());
        }
        {
            let mut state = self.lock();
            if !state.authorized {
                tracing::warn!("start_work_limit called before shield authorization");
                return Err(ShieldError::NotAuthorized);
            }
            state.armed = Some(schedule.clone());
        }
        tracing::info!(start = %schedule.start, end = %schedule.end, "shield armed");
        self.note(ShieldOperation::Arm);
        Ok(())
    }

    fn stop_work_limit(&self) -> Result<(), ShieldError> {
        if !self.enabled {
            return Ok(());
        }
        self.lock().armed = None;
        tracing::info!("shield disarmed");
        self.note(ShieldOperation::Disarm);
        Ok(())
    }

    fn request_bypass(&self) -> Result<(), ShieldError> {
        if !self.enabled {
            return Ok(());
        }
        if !self.is_armed() {
            return Err(ShieldError::Unavailable("no work limit is active".into()));
        }
        self.note(ShieldOperation::Bypass);
        self.bus
            .publish(ShieldEvent::new(ShieldEventKind::Bypass, None, Utc::now()));
        Ok(())
    }

    fn subscribe(&self) -> ShieldSubscription {
        self.bus.subscribe()
    }
}

/// Adapter for platforms without the capability. Everything succeeds and
/// nothing happens.
#[derive(Debug, Default)]
pub struct DisabledShield {
    bus: ShieldEventBus,
}

impl DisabledShield {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShieldAdapter for DisabledShield {
    fn is_enabled(&self) -> bool {
        false
    }

    fn request_authorization(&self) -> Result<bool, ShieldError> {
        Ok(true)
    }

    fn pick_applications_and_categories(&self) -> Result<BTreeSet<AppToken>, ShieldError> {
        Ok(BTreeSet::new())
    }

    fn start_work_limit(&self, _schedule: &WorkSchedule) -> Result<(), ShieldError> {
        Ok(())
    }

    fn stop_work_limit(&self) -> Result<(), ShieldError> {
        Ok(())
    }

    fn request_bypass(&self) -> Result<(), ShieldError> {
        Ok(())
    }

    fn subscribe(&self) -> ShieldSubscription {
        self.bus.subscribe()
    }
}
