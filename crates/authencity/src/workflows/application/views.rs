use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    ApplicationNumber, DocumentType, PaymentMethod, PersonalInfo, UploadedFileRecord, WizardStep,
};
use super::store::DraftStore;
use super::upload::UploadProgress;
use super::validation::ValidationErrors;
use super::wizard::{ApplicationWizard, WizardPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseLabel {
    Editing,
    Submitting,
    Submitted,
}

/// Read model handed to presentational layers: the draft slice plus the error map.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub phase: PhaseLabel,
    pub current_step: u8,
    pub step_label: &'static str,
    pub total_steps: u8,
    pub can_proceed: bool,
    pub selected_document_type: Option<DocumentType>,
    pub form_data: PersonalInfo,
    pub uploaded_files: Vec<UploadedFileRecord>,
    pub uploads_in_flight: Vec<UploadProgress>,
    pub selected_payment_method: Option<PaymentMethod>,
    pub errors: ValidationErrors,
    pub error_messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_number: Option<ApplicationNumber>,
    pub last_saved: Option<DateTime<Utc>>,
}

impl WizardView {
    pub fn from_wizard<S: DraftStore>(wizard: &ApplicationWizard<S>) -> Self {
        let draft = wizard.draft();
        let phase = match wizard.phase() {
            WizardPhase::Submitted => PhaseLabel::Submitted,
            WizardPhase::Editing(_) if wizard.is_submitting() => PhaseLabel::Submitting,
            WizardPhase::Editing(_) => PhaseLabel::Editing,
        };

        Self {
            phase,
            current_step: draft.current_step.number(),
            step_label: draft.current_step.label(),
            total_steps: WizardStep::LAST.number(),
            can_proceed: wizard.can_proceed(),
            selected_document_type: draft.selected_document_type,
            form_data: draft.personal_info.clone(),
            uploaded_files: draft.uploaded_files.clone(),
            uploads_in_flight: wizard.uploads_in_flight(),
            selected_payment_method: draft.selected_payment_method,
            errors: wizard.errors().clone(),
            error_messages: wizard.errors().messages(),
            notice: wizard.submission_notice().map(str::to_string),
            application_number: wizard.application_number().cloned(),
            last_saved: draft.last_saved_at,
        }
    }
}
