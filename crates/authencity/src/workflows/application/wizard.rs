use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::domain::{
    ApplicationNumber, DocumentType, FileCandidate, FileId, PaymentMethod, PersonalField,
    SlotId, UploadedFileRecord, WizardStep,
};
use super::draft::ApplicationDraft;
use super::navigation::{NavigationRequest, SubmissionConfirmation, SUBMITTED_MESSAGE};
use super::requirements::{file_extension, slot_requirement};
use super::store::{DraftStore, StoreError};
use super::submission::{GatewayError, SubmittedApplication};
use super::upload::{PendingUpload, UploadProgress, UploadRejection};
use super::validation::{validate_step, validate_through, ErrorField, ValidationErrors};

pub const SUBMISSION_FAILED_NOTICE: &str =
    "We could not submit your application. Please try again.";

/// Where the wizard stands overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardPhase {
    Editing(WizardStep),
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SubmissionState {
    Idle,
    Pending,
    Failed { notice: String },
    Submitted { application_number: ApplicationNumber },
}

#[derive(Debug, Clone)]
struct InFlightUpload {
    slot: SlotId,
    candidate: FileCandidate,
    percent: u8,
}

/// Errors surfaced by the submit action.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("submission is only possible from the review step (currently on step {current})")]
    NotOnReviewStep { current: u8 },
    #[error("the application has validation errors")]
    Invalid(ValidationErrors),
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    #[error("the application has already been submitted")]
    AlreadySubmitted,
    #[error("{}", SUBMISSION_FAILED_NOTICE)]
    Gateway(#[source] GatewayError),
}

/// Controller for the four-step document application flow.
///
/// All mutation goes through change events (`select_*`, `update_*`, upload and navigation
/// calls). The controller owns the draft, the error map and the in-flight upload table, and
/// writes snapshots through the injected [`DraftStore`].
pub struct ApplicationWizard<S> {
    draft: ApplicationDraft,
    errors: ValidationErrors,
    uploads: BTreeMap<FileId, InFlightUpload>,
    submission: SubmissionState,
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: DraftStore> ApplicationWizard<S> {
    /// Opens the wizard, resuming from the stored snapshot when one parses cleanly.
    pub fn mount(store: S, clock: Arc<dyn Clock>) -> Self {
        let draft = match store.load() {
            Ok(Some(raw)) => match ApplicationDraft::from_snapshot(&raw) {
                Ok(draft) => {
                    info!(
                        step = draft.current_step.number(),
                        files = draft.uploaded_files.len(),
                        "resumed application draft"
                    );
                    draft
                }
                Err(err) => {
                    debug!(error = %err, "discarding unreadable application draft");
                    ApplicationDraft::default()
                }
            },
            Ok(None) => ApplicationDraft::default(),
            Err(err) => {
                warn!(error = %err, "draft store unavailable; starting a fresh application");
                ApplicationDraft::default()
            }
        };

        Self {
            draft,
            errors: ValidationErrors::default(),
            uploads: BTreeMap::new(),
            submission: SubmissionState::Idle,
            store,
            clock,
        }
    }

    pub fn draft(&self) -> &ApplicationDraft {
        &self.draft
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn current_step(&self) -> WizardStep {
        self.draft.current_step
    }

    pub fn phase(&self) -> WizardPhase {
        match self.submission {
            SubmissionState::Submitted { .. } => WizardPhase::Submitted,
            _ => WizardPhase::Editing(self.draft.current_step),
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.submission, SubmissionState::Submitted { .. })
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.submission, SubmissionState::Pending)
    }

    pub fn submission_notice(&self) -> Option<&str> {
        match &self.submission {
            SubmissionState::Failed { notice } => Some(notice),
            _ => None,
        }
    }

    pub fn application_number(&self) -> Option<&ApplicationNumber> {
        match &self.submission {
            SubmissionState::Submitted { application_number } => Some(application_number),
            _ => None,
        }
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.draft.last_saved_at
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether the active step currently satisfies its predicate, without touching errors.
    pub fn can_proceed(&self) -> bool {
        !self.is_submitted()
            && !self.is_submitting()
            && validate_step(self.draft.current_step, &self.draft).is_empty()
    }

    pub fn select_document_type(&mut self, document_type: DocumentType) {
        if self.ignore_after_submit("select_document_type") {
            return;
        }
        self.draft.selected_document_type = Some(document_type);
        self.errors.clear_field(ErrorField::DocumentType);
    }

    pub fn update_personal_field(&mut self, field: PersonalField, value: impl Into<String>) {
        if self.ignore_after_submit("update_personal_field") {
            return;
        }
        self.draft.personal_info.set(field, value);
        self.errors.clear_field(ErrorField::Personal(field));
    }

    pub fn select_payment_method(&mut self, method: PaymentMethod) {
        if self.ignore_after_submit("select_payment_method") {
            return;
        }
        self.draft.selected_payment_method = Some(method);
        self.errors.clear_field(ErrorField::PaymentMethod);
    }

    /// Advances one step when the active step validates; otherwise records its errors.
    ///
    /// On the review step a passing `next` keeps the wizard where it is; leaving it is
    /// the job of [`Self::begin_submit`].
    pub fn next(&mut self) -> Result<WizardStep, ValidationErrors> {
        if self.ignore_after_submit("next") {
            return Ok(self.draft.current_step);
        }
        let current = self.draft.current_step;
        let errors = validate_step(current, &self.draft);
        if !errors.is_empty() {
            debug!(step = current.number(), errors = errors.len(), "step validation failed");
            self.errors = errors.clone();
            return Err(errors);
        }

        self.errors.clear();
        if let Some(next) = current.next() {
            self.draft.current_step = next;
        }
        Ok(self.draft.current_step)
    }

    /// Steps back without re-validating the step being left.
    pub fn previous(&mut self) -> WizardStep {
        if self.ignore_after_submit("previous") {
            return self.draft.current_step;
        }
        if let Some(previous) = self.draft.current_step.previous() {
            self.draft.current_step = previous;
            self.errors.clear();
        }
        self.draft.current_step
    }

    /// Checks a dropped file against its slot and registers it as in flight at 0 %.
    pub fn begin_upload(
        &mut self,
        slot: SlotId,
        candidate: FileCandidate,
    ) -> Result<PendingUpload, UploadRejection> {
        if self.is_submitted() {
            return Err(UploadRejection::AlreadySubmitted);
        }
        if self.draft.current_step != WizardStep::Upload {
            return Err(UploadRejection::NotOnUploadStep);
        }
        let document_type = self
            .draft
            .selected_document_type
            .ok_or(UploadRejection::NoDocumentType)?;
        let requirement = slot_requirement(document_type, slot)
            .ok_or(UploadRejection::UnknownSlot { slot })?;

        let extension = file_extension(&candidate.name);
        if !requirement.accepts_extension(&extension) {
            return Err(UploadRejection::invalid_format(extension, &requirement));
        }
        if !requirement.accepts_size(candidate.size) {
            return Err(UploadRejection::FileTooLarge {
                size: candidate.size,
                max_size: requirement.max_size_label(),
            });
        }

        let file_id = FileId::generate(slot, self.clock.now());
        self.uploads.insert(
            file_id.clone(),
            InFlightUpload {
                slot,
                candidate: candidate.clone(),
                percent: 0,
            },
        );
        debug!(%file_id, %slot, size = candidate.size, "upload accepted");

        Ok(PendingUpload {
            file_id,
            slot,
            candidate,
        })
    }

    /// Records progress for an in-flight upload. Values never go backwards.
    pub fn report_upload_progress(&mut self, file_id: &FileId, percent: u8) -> bool {
        match self.uploads.get_mut(file_id) {
            Some(upload) => {
                upload.percent = upload.percent.max(percent.min(100));
                true
            }
            None => false,
        }
    }

    /// Turns an in-flight upload into an [`UploadedFileRecord`] on the draft.
    pub fn complete_upload(&mut self, file_id: &FileId) -> Option<UploadedFileRecord> {
        let upload = self.uploads.remove(file_id)?;
        if self.is_submitted() {
            return None;
        }

        let record = UploadedFileRecord {
            id: file_id.clone(),
            slot: upload.slot,
            name: upload.candidate.name,
            size: upload.candidate.size,
            mime_type: upload.candidate.mime_type.unwrap_or_default(),
            uploaded_at: self.clock.now(),
        };
        self.draft.uploaded_files.push(record.clone());
        self.errors.clear_field(ErrorField::Documents);
        info!(file_id = %record.id, slot = %record.slot, "upload completed");
        Some(record)
    }

    /// Drops an in-flight upload that will never complete.
    pub fn cancel_upload(&mut self, file_id: &FileId) -> bool {
        self.uploads.remove(file_id).is_some()
    }

    /// Removes an accepted file immediately; files in other slots are untouched.
    pub fn remove_file(&mut self, file_id: &FileId) -> Option<UploadedFileRecord> {
        if self.ignore_after_submit("remove_file") {
            return None;
        }
        let index = self
            .draft
            .uploaded_files
            .iter()
            .position(|file| &file.id == file_id)?;
        Some(self.draft.uploaded_files.remove(index))
    }

    pub fn uploads_in_flight(&self) -> Vec<UploadProgress> {
        self.uploads
            .iter()
            .map(|(file_id, upload)| UploadProgress {
                file_id: file_id.clone(),
                slot: upload.slot,
                name: upload.candidate.name.clone(),
                percent: upload.percent,
            })
            .collect()
    }

    /// Writes the whole draft with a fresh `lastSaved`, overwriting the previous snapshot.
    ///
    /// Returns `Ok(None)` once the application is submitted and there is nothing to keep.
    pub fn autosave(&mut self) -> Result<Option<DateTime<Utc>>, StoreError> {
        if self.is_submitted() {
            return Ok(None);
        }

        let saved_at = self.clock.now();
        let mut snapshot = self.draft.clone();
        snapshot.last_saved_at = Some(saved_at);
        let raw = snapshot.to_snapshot()?;
        self.store.save(&raw)?;

        self.draft.last_saved_at = Some(saved_at);
        debug!(step = self.draft.current_step.number(), %saved_at, "application draft saved");
        Ok(Some(saved_at))
    }

    /// Gates and starts a submission, returning the record to hand to the gateway.
    ///
    /// Every step's predicate is re-checked so a tampered snapshot resumed on the review
    /// step cannot submit incomplete data.
    pub fn begin_submit(&mut self) -> Result<SubmittedApplication, SubmitError> {
        match self.submission {
            SubmissionState::Submitted { .. } => return Err(SubmitError::AlreadySubmitted),
            SubmissionState::Pending => return Err(SubmitError::AlreadySubmitting),
            SubmissionState::Idle | SubmissionState::Failed { .. } => {}
        }

        let current = self.draft.current_step;
        if current != WizardStep::Review {
            return Err(SubmitError::NotOnReviewStep {
                current: current.number(),
            });
        }

        let errors = validate_through(WizardStep::Review, &self.draft);
        let (Some(document_type), Some(payment_method), true) = (
            self.draft.selected_document_type,
            self.draft.selected_payment_method,
            errors.is_empty(),
        ) else {
            self.errors = errors.clone();
            return Err(SubmitError::Invalid(errors));
        };

        self.errors.clear();
        self.submission = SubmissionState::Pending;
        let submitted_at = self.clock.now();
        let application = SubmittedApplication {
            application_number: ApplicationNumber::generate(submitted_at),
            document_type,
            personal_info: self.draft.personal_info.clone(),
            uploaded_files: self.draft.uploaded_files.clone(),
            payment_method,
            submitted_at,
        };
        info!(application_number = %application.application_number, "submitting application");
        Ok(application)
    }

    /// Applies the gateway outcome. Success clears the stored draft and yields the
    /// dashboard redirect; failure keeps everything so the applicant can retry.
    pub fn finish_submit(
        &mut self,
        application: &SubmittedApplication,
        outcome: Result<(), GatewayError>,
    ) -> Result<NavigationRequest, SubmitError> {
        if let Err(err) = outcome {
            warn!(
                application_number = %application.application_number,
                error = %err,
                "application submission failed"
            );
            self.submission = SubmissionState::Failed {
                notice: SUBMISSION_FAILED_NOTICE.to_string(),
            };
            return Err(SubmitError::Gateway(err));
        }

        if let Err(err) = self.store.clear() {
            warn!(error = %err, "submitted application draft could not be cleared");
        }
        self.uploads.clear();
        self.submission = SubmissionState::Submitted {
            application_number: application.application_number.clone(),
        };
        info!(application_number = %application.application_number, "application submitted");

        Ok(NavigationRequest::dashboard(SubmissionConfirmation {
            message: SUBMITTED_MESSAGE.to_string(),
            application_number: application.application_number.clone(),
            document_type: application.document_type,
        }))
    }

    fn ignore_after_submit(&self, change: &'static str) -> bool {
        if self.is_submitted() {
            debug!(change, "ignoring change event after submission");
        }
        self.is_submitted()
    }
}
