//! Secret storage and output masking.
//!
//! - [`SecretStore`] - Where encrypted requirement values are kept
//! - [`KeyringSecretStore`] - The OS keychain, used by the CLI
//! - [`OutputMasker`] - Hides encrypted values in printed output
//!
//! # Example
//!
//! ```
//! use prepkit::secrets::{MemorySecretStore, OutputMasker, SecretStore};
//!
//! let store = MemorySecretStore::new();
//! store.set("/proj", "DB_PASSWORD", "hunter2").unwrap();
//!
//! let mut masker = OutputMasker::new();
//! masker.add_secret(store.get("/proj", "DB_PASSWORD").unwrap());
//! assert_eq!(masker.mask("DB_PASSWORD=hunter2"), "DB_PASSWORD=[REDACTED]");
//! ```

pub mod keychain;
pub mod mask;
pub mod store;

pub use keychain::KeyringSecretStore;
pub use mask::OutputMasker;
pub use store::{project_scope, MemorySecretStore, SecretStore};
