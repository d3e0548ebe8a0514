mod config;
pub mod database;
pub mod migrations;

pub use config::{
    AuthConfig, Config, CredentialBackend, GeofenceConfig, ShieldConfig, TelemetryConfig,
    UsageConfig, SHIELD_ENABLED_ENV,
};
pub use database::Database;

use std::path::PathBuf;

/// Overrides the data directory entirely.
pub const DATA_DIR_ENV: &str = "SHIFTGUARD_DATA_DIR";

/// Returns `~/.config/shiftguard[-dev]/` based on SHIFTGUARD_ENV.
///
/// Set SHIFTGUARD_ENV=dev to use development data directory, or
/// SHIFTGUARD_DATA_DIR to use an explicit one.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env =
                std::env::var("SHIFTGUARD_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("shiftguard-dev")
            } else {
                base_dir.join("shiftguard")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
