//! Shared display helpers for requirement statuses and outcomes.
//!
//! Everything printed here passes through an [`OutputMasker`] so values of
//! encrypted variables never reach the terminal.

use crate::prepare::PrepareResult;
use crate::project::Project;
use crate::requirements::{RequirementStatus, Status};
use crate::secrets::OutputMasker;
use crate::ui::UserInterface;

/// A masker for every encrypted value in `result`'s environment.
pub fn masker_for(project: &Project, result: &PrepareResult) -> OutputMasker {
    OutputMasker::for_requirements(project.requirements(), result.environ())
}

/// Print one line per requirement, styled by whether it is met.
pub fn show_requirement_statuses(ui: &mut dyn UserInterface, statuses: &[RequirementStatus]) {
    for status in statuses {
        let line = format!("{}: {}", status.requirement.title(), status.status_description);
        if status.is_satisfied() {
            ui.success(&line);
        } else {
            ui.warning(&line);
        }
    }
}

/// Print the outcome of a prepare run. Returns whether it succeeded.
pub fn show_prepare_result(
    ui: &mut dyn UserInterface,
    masker: &OutputMasker,
    result: &PrepareResult,
) -> bool {
    let logs: Vec<String> = result.logs().iter().map(|l| masker.mask(l)).collect();
    ui.show_details(&logs);

    if result.failed() {
        for error in result.errors() {
            ui.error(&masker.mask(error));
        }
        false
    } else {
        ui.success("The project is ready to run commands.");
        true
    }
}

/// Print a cleanup or operation status. Returns whether it succeeded.
pub fn show_status(ui: &mut dyn UserInterface, status: &Status) -> bool {
    ui.show_details(&status.logs);
    if status.success {
        ui.success(&status.description);
    } else {
        for error in &status.errors {
            ui.error(error);
        }
        ui.error(&status.description);
    }
    status.success
}
