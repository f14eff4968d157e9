//! Session-scoped configuration choices.
//!
//! [`UserConfigOverrides`] holds what a user picked during one prepare
//! attempt that hasn't been written to durable state. Every stage of the
//! attempt shares the same instance.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Overrides shared by all stages of one prepare attempt.
pub type SharedOverrides = Rc<RefCell<UserConfigOverrides>>;

/// One option picked for one requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceSelection {
    pub option_id: String,
    pub value: Option<String>,
}

/// Choices made during a prepare attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserConfigOverrides {
    /// Env spec picked for this attempt.
    pub env_spec_name: Option<String>,
    /// Use this already-active environment prefix instead of a project-owned one.
    pub inherited_env: Option<String>,
    choices: BTreeMap<String, ChoiceSelection>,
}

impl UserConfigOverrides {
    /// Empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides that reuse an already-active environment.
    pub fn with_inherited_env(prefix: impl Into<String>) -> Self {
        Self {
            inherited_env: Some(prefix.into()),
            ..Default::default()
        }
    }

    /// Wrap for sharing between stages.
    pub fn shared(self) -> SharedOverrides {
        Rc::new(RefCell::new(self))
    }

    /// The choice recorded for a requirement.
    pub fn choice(&self, env_var: &str) -> Option<&ChoiceSelection> {
        self.choices.get(env_var)
    }

    /// Record a choice, replacing any earlier one for the same requirement.
    pub fn set_choice(&mut self, env_var: &str, option_id: &str, value: Option<String>) {
        self.choices.insert(
            env_var.to_string(),
            ChoiceSelection {
                option_id: option_id.to_string(),
                value,
            },
        );
    }

    /// Forget the choice for a requirement.
    pub fn clear_choice(&mut self, env_var: &str) {
        self.choices.remove(env_var);
    }

    /// The value entered for a requirement, if the choice carries one.
    pub fn value_for(&self, env_var: &str) -> Option<&str> {
        self.choices
            .get(env_var)
            .and_then(|c| c.value.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// The option picked for a requirement.
    pub fn option_for(&self, env_var: &str) -> Option<&str> {
        self.choices.get(env_var).map(|c| c.option_id.as_str())
    }

    /// Whether nothing has been chosen.
    pub fn is_empty(&self) -> bool {
        self.env_spec_name.is_none() && self.inherited_env.is_none() && self.choices.is_empty()
    }
}
