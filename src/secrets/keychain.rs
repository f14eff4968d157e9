//! Secret storage in the OS keychain.
//!
//! Values survive the process, so a password set once with
//! `prepkit set-variable` is picked up by later runs. Each value is one
//! keychain entry under the `prepkit` service, with the project scope and
//! variable name as the account.

use anyhow::Context;
use keyring::Entry;

use super::SecretStore;

/// Keychain service name for every prepkit entry.
pub const KEYCHAIN_SERVICE: &str = "prepkit";

/// [`SecretStore`] backed by the platform keychain.
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub fn new() -> Self {
        Self::with_service(KEYCHAIN_SERVICE)
    }

    /// Store entries under a different service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, scope: &str, key: &str) -> keyring::Result<Entry> {
        Entry::new(&self.service, &account(scope, key))
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Keychain account for `key` in `scope`.
pub fn account(scope: &str, key: &str) -> String {
    format!("{}/{}", scope.trim_end_matches('/'), key)
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, scope: &str, key: &str) -> Option<String> {
        match self.entry(scope, key).and_then(|e| e.get_password()) {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                tracing::warn!("Could not read {} from the keychain: {}", key, e);
                None
            }
        }
    }

    fn set(&self, scope: &str, key: &str, value: &str) -> anyhow::Result<()> {
        self.entry(scope, key)
            .and_then(|e| e.set_password(value))
            .with_context(|| format!("Failed to save {} in the keychain", key))
    }

    fn unset(&self, scope: &str, key: &str) -> anyhow::Result<()> {
        match self.entry(scope, key).and_then(|e| e.delete_credential()) {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {} from the keychain", key))
            }
        }
    }
}
