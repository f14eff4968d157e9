//! Answering prepare forms through a [`UserInterface`].

use crate::error::{PrepkitError, Result};
use crate::prepare::{ConfigSubmission, InputSource, RequirementForm};
use crate::providers::ConfigChoice;

use super::{Prompt, PromptOption, PromptType, UserInterface};

/// Asks the user for each form's option, and a value where the option takes one.
///
/// A prompt that can't be answered without a terminal ends the session
/// instead of failing it.
pub struct UiInputSource<'a> {
    ui: &'a mut dyn UserInterface,
}

impl<'a> UiInputSource<'a> {
    pub fn new(ui: &'a mut dyn UserInterface) -> Self {
        Self { ui }
    }

    fn pick_option<'f>(&mut self, form: &'f RequirementForm) -> Result<Option<&'f ConfigChoice>> {
        if form.options.len() <= 1 {
            return Ok(form.options.first());
        }

        let options = form
            .options
            .iter()
            .map(|o| PromptOption {
                label: o.label.clone(),
                value: o.option_id.clone(),
            })
            .collect();
        let mut prompt = Prompt::new(
            form.requirement_id.clone(),
            format!("How should {} be set up?", form.requirement_id),
            PromptType::Select { options },
        );
        if let Some(default) = form.default_option() {
            prompt = prompt.with_default(default.option_id.clone());
        }

        let picked = self.ui.prompt(&prompt)?.as_string();
        Ok(form.options.iter().find(|o| o.option_id == picked))
    }

    fn ask_value(&mut self, form: &RequirementForm, choice: &ConfigChoice) -> Result<Option<String>> {
        let prompt_type = if choice.secret {
            PromptType::Password
        } else {
            PromptType::Input
        };
        let prompt = Prompt::new(
            format!("{}_VALUE", form.requirement_id),
            format!("Value for {}", form.requirement_id),
            prompt_type,
        );
        let value = self.ui.prompt(&prompt)?.as_string();
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    fn collect_form(&mut self, form: &RequirementForm) -> Result<Option<ConfigSubmission>> {
        self.ui.message(&form.title);
        self.ui.warning(&form.status_description);

        let Some(choice) = self.pick_option(form)? else {
            return Ok(None);
        };
        let value = if choice.accepts_value {
            self.ask_value(form, choice)?
        } else {
            None
        };
        Ok(Some(ConfigSubmission::new(
            &form.requirement_id,
            &choice.option_id,
            value,
        )))
    }
}

impl InputSource for UiInputSource<'_> {
    fn collect(
        &mut self,
        stage_description: &str,
        forms: &[RequirementForm],
    ) -> Result<Option<Vec<ConfigSubmission>>> {
        self.ui.show_header(stage_description);

        let mut submissions = Vec::new();
        for form in forms {
            match self.collect_form(form) {
                Ok(Some(submission)) => submissions.push(submission),
                Ok(None) => {}
                Err(PrepkitError::NoPromptAnswer { key }) => {
                    tracing::debug!("No answer for prompt '{}', giving up", key);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Some(submissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::{MockUI, NonInteractiveUI, OutputMode};
    use std::collections::HashMap;

    fn form() -> RequirementForm {
        RequirementForm {
            requirement_id: "DB_URL".to_string(),
            title: "A database URL".to_string(),
            status_description: "DB_URL is not set".to_string(),
            options: vec![
                ConfigChoice::new("default", "Use default").default_selected(true),
                ConfigChoice::new("variables", "Use this value:").with_value(false),
            ],
        }
    }

    #[test]
    fn picks_default_option_without_asking_for_value() {
        let mut ui = MockUI::new();
        let submissions = UiInputSource::new(&mut ui)
            .collect("Set up project requirements.", &[form()])
            .unwrap()
            .unwrap();

        assert_eq!(
            submissions,
            vec![ConfigSubmission::new("DB_URL", "default", None)]
        );
        assert_eq!(ui.headers(), &["Set up project requirements.".to_string()]);
        assert_eq!(ui.prompts_shown(), &["DB_URL".to_string()]);
    }

    #[test]
    fn asks_for_value_when_option_takes_one() {
        let mut ui = MockUI::new();
        ui.set_prompt_response("DB_URL", "variables");
        ui.set_prompt_response("DB_URL_VALUE", "postgres://localhost");

        let submissions = UiInputSource::new(&mut ui)
            .collect("stage", &[form()])
            .unwrap()
            .unwrap();

        assert_eq!(
            submissions,
            vec![ConfigSubmission::new(
                "DB_URL",
                "variables",
                Some("postgres://localhost".to_string())
            )]
        );
    }

    #[test]
    fn single_option_skips_select() {
        let mut ui = MockUI::new();
        ui.set_prompt_response("TOKEN_VALUE", "abc");
        let form = RequirementForm {
            requirement_id: "TOKEN".to_string(),
            title: "A token".to_string(),
            status_description: "TOKEN is not set".to_string(),
            options: vec![ConfigChoice::new("variables", "Use this value:").with_value(true)],
        };

        let submissions = UiInputSource::new(&mut ui)
            .collect("stage", &[form])
            .unwrap()
            .unwrap();

        assert_eq!(ui.prompts_shown(), &["TOKEN_VALUE".to_string()]);
        assert_eq!(submissions[0].value.as_deref(), Some("abc"));
    }

    #[test]
    fn unanswerable_prompt_gives_up() {
        let mut overrides = HashMap::new();
        overrides.insert("PREPKIT_PROMPT_DB_URL".to_string(), "variables".to_string());
        let mut ui = NonInteractiveUI::with_overrides(OutputMode::Silent, overrides);

        let result = UiInputSource::new(&mut ui)
            .collect("stage", &[form()])
            .unwrap();

        assert!(result.is_none());
    }
}
