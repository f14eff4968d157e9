//! Interactive prepare sessions.
//!
//! An [`InteractiveSession`] drives a stage chain by request and response.
//! [`read`](InteractiveSession::read) returns the forms for whatever the
//! pending stage can't satisfy on its own.
//! [`write`](InteractiveSession::write) takes the user's picks, runs the
//! stage, and returns the next payload. Stages that need no input are run
//! without stopping.

use super::result::PrepareResult;
use super::stage::PrepareStage;
use crate::error::{PrepkitError, Result};
use crate::providers::ConfigChoice;

/// Configuration form for one unsatisfied requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementForm {
    /// The requirement's variable.
    pub requirement_id: String,
    pub title: String,
    pub status_description: String,
    pub options: Vec<ConfigChoice>,
}

impl RequirementForm {
    /// The option selected when the user picks nothing.
    pub fn default_option(&self) -> Option<&ConfigChoice> {
        self.options
            .iter()
            .find(|o| o.is_default)
            .or_else(|| self.options.first())
    }
}

/// What the session needs from its caller next.
#[derive(Debug, Clone)]
pub enum SessionPayload {
    /// The pending stage needs the user to pick options.
    Configure {
        stage_description: String,
        forms: Vec<RequirementForm>,
    },
    /// The run is over.
    Done(PrepareResult),
}

/// One requirement's picked option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSubmission {
    pub requirement_id: String,
    pub option_id: String,
    pub value: Option<String>,
}

impl ConfigSubmission {
    pub fn new(requirement_id: &str, option_id: &str, value: Option<String>) -> Self {
        Self {
            requirement_id: requirement_id.to_string(),
            option_id: option_id.to_string(),
            value,
        }
    }
}

/// Where an interactive prepare gets its answers.
pub trait InputSource {
    /// Collect picks for the given forms. `None` means the user gave up.
    fn collect(
        &mut self,
        stage_description: &str,
        forms: &[RequirementForm],
    ) -> Result<Option<Vec<ConfigSubmission>>>;
}

/// A prepare run waiting on user input between stages.
pub struct InteractiveSession {
    /// The stage waiting for input, or the last one run once done.
    pending: PrepareStage,
    payload: SessionPayload,
    last_result: Option<PrepareResult>,
}

impl InteractiveSession {
    /// Start a session, running ahead until a stage needs input.
    pub fn new(stage: PrepareStage) -> Result<Self> {
        let mut session = Self {
            pending: stage,
            payload: SessionPayload::Configure {
                stage_description: String::new(),
                forms: Vec::new(),
            },
            last_result: None,
        };
        session.advance()?;
        Ok(session)
    }

    /// The current payload.
    pub fn read(&self) -> SessionPayload {
        self.payload.clone()
    }

    /// Whether the run is over.
    pub fn is_done(&self) -> bool {
        matches!(self.payload, SessionPayload::Done(_))
    }

    /// Apply picks, run the pending stage, and move on.
    pub fn write(&mut self, submissions: &[ConfigSubmission]) -> Result<SessionPayload> {
        let SessionPayload::Configure { forms, .. } = &self.payload else {
            return Err(PrepkitError::InvalidState {
                message: "the prepare session is already done".to_string(),
            });
        };
        for submission in submissions {
            let form = forms
                .iter()
                .find(|f| f.requirement_id == submission.requirement_id)
                .ok_or_else(|| PrepkitError::UnknownRequirement {
                    requirement: submission.requirement_id.clone(),
                })?;
            if !form
                .options
                .iter()
                .any(|o| o.option_id == submission.option_id)
            {
                return Err(PrepkitError::InvalidChoice {
                    requirement: submission.requirement_id.clone(),
                    option: submission.option_id.clone(),
                });
            }
        }

        {
            let overrides = self.pending.overrides();
            let mut overrides = overrides.borrow_mut();
            for submission in submissions {
                tracing::debug!(
                    "Configured {} with option '{}'",
                    submission.requirement_id,
                    submission.option_id
                );
                overrides.set_choice(
                    &submission.requirement_id,
                    &submission.option_id,
                    submission.value.clone(),
                );
            }
        }

        match self.run_pending()? {
            Some(next) => {
                self.pending = next;
                self.advance()?;
            }
            None => self.finish(),
        }
        Ok(self.read())
    }

    /// Give up. The last failure stands, or one built from the pending stage.
    pub fn abandon(self) -> PrepareResult {
        match self.payload {
            SessionPayload::Done(result) => result,
            SessionPayload::Configure { .. } => self
                .last_result
                .unwrap_or_else(|| self.pending.abandoned_result()),
        }
    }

    fn run_pending(&mut self) -> Result<Option<PrepareStage>> {
        let next = self.pending.execute()?;
        if let Some(result) = self.pending.result()? {
            self.last_result = Some(result.clone());
        }
        Ok(next)
    }

    /// Run stages that need no input, stopping at the first one that does.
    fn advance(&mut self) -> Result<()> {
        loop {
            let forms = forms_for(&self.pending)?;
            if !forms.is_empty() {
                self.payload = SessionPayload::Configure {
                    stage_description: self.pending.description().to_string(),
                    forms,
                };
                return Ok(());
            }

            let next = self.run_pending()?;
            // Nothing the user could pick would change a stage without forms.
            if self.pending.failed()? {
                break;
            }
            match next {
                Some(next) => self.pending = next,
                None => break,
            }
        }
        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        if let Some(result) = &self.last_result {
            self.payload = SessionPayload::Done(result.clone());
        }
    }
}

fn forms_for(stage: &PrepareStage) -> Result<Vec<RequirementForm>> {
    Ok(stage
        .statuses_before_execute()?
        .into_iter()
        .filter(|status| !status.satisfied)
        .filter_map(|status| {
            let options = stage.configuration_choices(&status);
            if options.is_empty() {
                return None;
            }
            Some(RequirementForm {
                requirement_id: status.requirement.env_var.clone(),
                title: status.requirement.title(),
                status_description: status.status_description.clone(),
                options,
            })
        })
        .collect())
}

/// Drive a session with `input` until it finishes or the input runs out.
pub fn prepare_interactively(
    stage: PrepareStage,
    input: &mut dyn InputSource,
) -> Result<PrepareResult> {
    let mut session = InteractiveSession::new(stage)?;
    loop {
        match session.read() {
            SessionPayload::Done(result) => return Ok(result),
            SessionPayload::Configure {
                stage_description,
                forms,
            } => match input.collect(&stage_description, &forms)? {
                Some(submissions) => {
                    session.write(&submissions)?;
                }
                None => {
                    tracing::debug!("Input ended, abandoning prepare");
                    return Ok(session.abandon());
                }
            },
        }
    }
}
