//! Secret storage.
//!
//! Encrypted requirement values live in a [`SecretStore`] instead of the
//! project's local state. Values are scoped per project so two projects can
//! hold different values for the same variable.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// Keyed storage for encrypted variable values.
pub trait SecretStore {
    /// Look up a value.
    fn get(&self, scope: &str, key: &str) -> Option<String>;

    /// Store a value, replacing any previous one.
    fn set(&self, scope: &str, key: &str, value: &str) -> anyhow::Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    fn unset(&self, scope: &str, key: &str) -> anyhow::Result<()>;
}

/// Scope under which a project's secrets are stored.
pub fn project_scope(project_dir: &Path) -> String {
    project_dir.to_string_lossy().to_string()
}

/// Process-lifetime secret storage.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    values: RefCell<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, scope: &str, key: &str) -> Option<String> {
        self.values
            .borrow()
            .get(&(scope.to_string(), key.to_string()))
            .cloned()
    }

    fn set(&self, scope: &str, key: &str, value: &str) -> anyhow::Result<()> {
        self.values
            .borrow_mut()
            .insert((scope.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn unset(&self, scope: &str, key: &str) -> anyhow::Result<()> {
        self.values
            .borrow_mut()
            .remove(&(scope.to_string(), key.to_string()));
        Ok(())
    }
}
