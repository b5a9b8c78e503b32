//! Citizen-facing application wizard for official documents.
//!
//! A four-step flow (document type, personal information, document upload, review and
//! payment) driven by [`ApplicationWizard`]. The draft is persisted through a
//! [`DraftStore`] so an interrupted application resumes where it stopped, and
//! [`WizardSession`] runs the autosave timer, simulated uploads and the submission beside it.

pub mod clock;
pub mod domain;
pub mod draft;
pub mod navigation;
pub mod requirements;
pub mod review;
pub mod session;
pub mod store;
pub mod submission;
pub mod upload;
pub mod validation;
pub mod views;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    ApplicationNumber, DocumentType, FileCandidate, FileId, PaymentMethod, PersonalField,
    PersonalInfo, SlotId, UnknownVariant, UploadedFileRecord, WizardStep,
};
pub use draft::ApplicationDraft;
pub use navigation::{
    NavigationRequest, Navigator, RecordingNavigator, SubmissionConfirmation, DASHBOARD_ROUTE,
    SUBMITTED_MESSAGE,
};
pub use requirements::{required_slots, slot_requirement, slots_for, SlotRequirement};
pub use review::{format_file_size, ReviewSummary};
pub use session::{SessionSettings, UploadHandle, WizardSession, DEFAULT_AUTOSAVE_INTERVAL};
pub use store::{DraftStore, FileDraftStore, InMemoryDraftStore, StoreError, DEFAULT_DRAFT_KEY};
pub use submission::{GatewayError, SimulatedGateway, SubmissionGateway, SubmittedApplication};
pub use upload::{
    FixedIncrements, PendingUpload, ProgressIncrements, RandomIncrements, ScriptedIncrements,
    UploadProgress, UploadRejection, UploadSimulator, DEFAULT_UPLOAD_TICK,
};
pub use validation::{ErrorField, ValidationError, ValidationErrors};
pub use views::{PhaseLabel, WizardView};
pub use wizard::{ApplicationWizard, SubmitError, WizardPhase, SUBMISSION_FAILED_NOTICE};
