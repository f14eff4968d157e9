//! Masking of encrypted values in printed output.

use std::collections::BTreeSet;

use crate::environ::Environ;
use crate::requirements::Requirement;

/// Replaces registered secret values with a mask string.
///
/// # Example
///
/// ```
/// use prepkit::secrets::OutputMasker;
///
/// let mut masker = OutputMasker::new();
/// masker.add_secret("s3cret");
/// assert_eq!(masker.mask("password is s3cret"), "password is [REDACTED]");
/// ```
#[derive(Debug, Clone)]
pub struct OutputMasker {
    secrets: BTreeSet<String>,
    mask: String,
}

impl OutputMasker {
    /// Create a masker using `[REDACTED]`.
    pub fn new() -> Self {
        Self {
            secrets: BTreeSet::new(),
            mask: "[REDACTED]".to_string(),
        }
    }

    /// Masker for every encrypted requirement value present in `environ`.
    pub fn for_requirements(requirements: &[Requirement], environ: &Environ) -> Self {
        let mut masker = Self::new();
        for requirement in requirements.iter().filter(|r| r.encrypted) {
            if let Some(value) = environ.get(&requirement.env_var) {
                masker.add_secret(value.clone());
            }
        }
        masker
    }

    /// Register a value to hide. Empty strings are ignored.
    pub fn add_secret(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.secrets.insert(value);
        }
    }

    /// Number of registered values.
    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    /// Hide every registered value in `input`.
    ///
    /// Longer values are replaced first so a secret containing another
    /// secret is hidden whole.
    pub fn mask(&self, input: &str) -> String {
        let mut ordered: Vec<&String> = self.secrets.iter().collect();
        ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut result = input.to_string();
        for secret in ordered {
            result = result.replace(secret.as_str(), &self.mask);
        }
        result
    }
}

impl Default for OutputMasker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_registered_value() {
        let mut masker = OutputMasker::new();
        masker.add_secret("hunter2");
        assert_eq!(masker.mask("pw=hunter2;"), "pw=[REDACTED];");
    }

    #[test]
    fn ignores_empty_values() {
        let mut masker = OutputMasker::new();
        masker.add_secret("");
        assert_eq!(masker.secret_count(), 0);
        assert_eq!(masker.mask("unchanged"), "unchanged");
    }

    #[test]
    fn longer_secrets_win() {
        let mut masker = OutputMasker::new();
        masker.add_secret("abc");
        masker.add_secret("abcdef");
        assert_eq!(masker.mask("x abcdef y"), "x [REDACTED] y");
    }

    #[test]
    fn collects_encrypted_requirement_values() {
        let requirements = vec![
            Requirement::env_var("DB_PASSWORD"),
            Requirement::env_var("DB_HOST"),
        ];
        let mut environ = Environ::new();
        environ.insert("DB_PASSWORD".to_string(), "hunter2".to_string());
        environ.insert("DB_HOST".to_string(), "localhost".to_string());

        let masker = OutputMasker::for_requirements(&requirements, &environ);

        assert_eq!(masker.secret_count(), 1);
        assert_eq!(
            masker.mask("DB_HOST=localhost DB_PASSWORD=hunter2"),
            "DB_HOST=localhost DB_PASSWORD=[REDACTED]"
        );
    }
}
