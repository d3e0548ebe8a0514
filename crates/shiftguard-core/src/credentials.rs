//! Credential storage boundary and the auth context derived from it.
//!
//! Token issuance is not modelled: signing in stores locally generated
//! tokens. What matters to the rest of the core is whether an access token
//! exists and which organization the worker belongs to.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CredentialError, ValidationError};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const ORG_ID_KEY: &str = "org_id";
pub const USER_EMAIL_KEY: &str = "user_email";

const ALL_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, ORG_ID_KEY, USER_EMAIL_KEY];

/// Get/set/delete a string by key.
pub trait CredentialStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError>;
    /// Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> Result<(), CredentialError>;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CredentialError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// OS keyring backing.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub const DEFAULT_SERVICE: &'static str = "shiftguard";

    pub fn new() -> Self {
        Self::with_service(Self::DEFAULT_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, CredentialError> {
        Ok(keyring::Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        match self.entry(key)?.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CredentialError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// What the rest of the app needs to know about the signed-in worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub authenticated: bool,
    pub org_id: Option<String>,
    pub user_email: Option<String>,
}

impl AuthContext {
    pub fn load(store: &dyn CredentialStore) -> Result<Self, CredentialError> {
        let token = store.get(ACCESS_TOKEN_KEY)?;
        Ok(Self {
            authenticated: token.is_some_and(|t| !t.is_empty()),
            org_id: store.get(ORG_ID_KEY)?,
            user_email: store.get(USER_EMAIL_KEY)?,
        })
    }
}

/// Store fresh tokens for `email`.
pub fn sign_in(store: &dyn CredentialStore, email: &str) -> Result<AuthContext, CoreError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ValidationError::InvalidValue {
            field: "email".into(),
            message: format!("'{email}' is not an email address"),
        }
        .into());
    }
    store.set(ACCESS_TOKEN_KEY, &format!("access_{}", Uuid::new_v4().simple()))?;
    store.set(REFRESH_TOKEN_KEY, &format!("refresh_{}", Uuid::new_v4().simple()))?;
    store.set(USER_EMAIL_KEY, email)?;
    tracing::info!(email, "signed in");
    Ok(AuthContext::load(store)?)
}

/// Forget tokens, user and organization.
pub fn sign_out(store: &dyn CredentialStore) -> Result<(), CredentialError> {
    for key in ALL_KEYS {
        store.delete(key)?;
    }
    tracing::info!("signed out");
    Ok(())
}

/// Join an organization by invite code. Codes are trimmed and upper-cased.
pub fn redeem_org_code(store: &dyn CredentialStore, code: &str) -> Result<String, CoreError> {
    let org_id = code.trim().to_uppercase();
    if org_id.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "code".into(),
            message: "organization code is empty".into(),
        }
        .into());
    }
    store.set(ORG_ID_KEY, &org_id)?;
    tracing::info!(org_id = %org_id, "organization code redeemed");
    Ok(org_id)
}
