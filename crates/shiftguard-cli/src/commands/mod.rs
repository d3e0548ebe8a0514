//! Subcommand handlers and the state they share.
//!
//! Every invocation rebuilds its services from disk: the config file, the
//! SQLite database, and the shield state kept in the kv table.

pub mod auth;
pub mod breaks;
pub mod clock;
pub mod config;
pub mod shield;
pub mod stats;
pub mod usage;

use std::sync::Arc;

use serde::Serialize;
use shiftguard_core::credentials::{AuthContext, CredentialStore, KeyringCredentialStore};
use shiftguard_core::session::SessionStore;
use shiftguard_core::shield::{
    LocalShield, ShieldDispatcher, ShieldEventCounts, ShieldEventLog, ShieldSubscription,
    ShieldTicket,
};
use shiftguard_core::storage::{Config, CredentialBackend, Database};
use shiftguard_core::telemetry::{NoopTelemetry, TelemetrySink, TracingTelemetry};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const SHIELD_STATE_KEY: &str = "shield_state";
const SHIELD_COUNTS_KEY: &str = "shield_event_counts";

pub struct Context {
    pub config: Config,
    pub db: Database,
}

impl Context {
    pub fn load() -> CliResult<Self> {
        Ok(Self {
            config: Config::load()?,
            db: Database::open()?,
        })
    }

    pub fn credentials(&self) -> CliResult<Box<dyn CredentialStore>> {
        let store: Box<dyn CredentialStore> = match self.config.auth.backend {
            CredentialBackend::Database => Box::new(Database::open()?),
            CredentialBackend::Keyring => Box::new(KeyringCredentialStore::new()),
        };
        Ok(store)
    }

    pub fn auth(&self) -> CliResult<AuthContext> {
        Ok(AuthContext::load(self.credentials()?.as_ref())?)
    }

    /// Refuse to continue unless someone is signed in.
    pub fn require_auth(&self) -> CliResult<AuthContext> {
        let auth = self.auth()?;
        if !auth.authenticated {
            return Err("not signed in; run `shiftguard auth login <email>` first".into());
        }
        Ok(auth)
    }

    pub fn telemetry(&self) -> Arc<dyn TelemetrySink> {
        if self.config.telemetry.enabled {
            Arc::new(TracingTelemetry)
        } else {
            Arc::new(NoopTelemetry)
        }
    }

    pub fn shield(&self) -> CliResult<Arc<LocalShield>> {
        let state = self.db.kv_get_json(SHIELD_STATE_KEY)?.unwrap_or_default();
        Ok(Arc::new(LocalShield::from_state(
            self.config.shield_enabled(),
            state,
        )))
    }

    pub fn save_shield(&self, shield: &LocalShield) -> CliResult {
        self.db.kv_set_json(SHIELD_STATE_KEY, &shield.snapshot())?;
        Ok(())
    }

    pub fn event_log(&self) -> CliResult<ShieldEventLog> {
        let totals: ShieldEventCounts = self.db.kv_get_json(SHIELD_COUNTS_KEY)?.unwrap_or_default();
        Ok(ShieldEventLog::new(self.telemetry()).with_totals(totals))
    }

    /// Record whatever the shield published during this invocation.
    pub fn flush_events(&self, subscription: &mut ShieldSubscription) -> CliResult<ShieldEventCounts> {
        let mut log = self.event_log()?;
        log.drain(subscription);
        self.db.kv_set_json(SHIELD_COUNTS_KEY, &log.totals())?;
        Ok(log.totals())
    }

    /// Session store wired to the shield, with any open session restored.
    pub fn session_store(&self, dispatcher: ShieldDispatcher) -> CliResult<SessionStore> {
        let mut store = SessionStore::new(Box::new(Database::open()?), dispatcher, self.telemetry())
            .with_schedule(self.config.shield.schedule.clone());
        store.restore()?;
        Ok(store)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Wait for a shield call and print its warning, if any.
pub async fn report_shield(ticket: ShieldTicket) {
    if let Some(warning) = ticket.outcome().await {
        eprintln!("warning: {warning}");
    }
}
