use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::workflows::application::{
    required_slots, ApplicationWizard, DocumentType, FileCandidate, InMemoryDraftStore,
    ManualClock, PersonalField, RecordingNavigator, SessionSettings, SimulatedGateway, SlotId,
    UploadedFileRecord, WizardSession, WizardStep,
};

pub(super) const MB: u64 = 1024 * 1024;

pub(super) type TestWizard = ApplicationWizard<Arc<InMemoryDraftStore>>;
pub(super) type TestSession = WizardSession<Arc<InMemoryDraftStore>, SimulatedGateway>;

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid start time")
}

pub(super) fn clock() -> ManualClock {
    ManualClock::starting_at(start_time())
}

pub(super) fn mount(store: &Arc<InMemoryDraftStore>, clock: &ManualClock) -> TestWizard {
    ApplicationWizard::mount(Arc::clone(store), Arc::new(clock.clone()))
}

pub(super) fn fresh_wizard() -> WizardFixture {
    let store = Arc::new(InMemoryDraftStore::default());
    let clock = clock();
    let wizard = mount(&store, &clock);
    (wizard, store, clock)
}

pub(super) fn fill_personal_info(wizard: &mut TestWizard) {
    let values = [
        (PersonalField::FirstName, "Erika"),
        (PersonalField::LastName, "Mustermann"),
        (PersonalField::DateOfBirth, "1984-08-12"),
        (PersonalField::PlaceOfBirth, "Berlin"),
        (PersonalField::Nationality, "German"),
        (PersonalField::Gender, "female"),
        (PersonalField::Email, "erika@example.de"),
        (PersonalField::Phone, "+49 30 1234567"),
        (PersonalField::Street, "Heidestraße 17"),
        (PersonalField::PostalCode, "51147"),
        (PersonalField::City, "Köln"),
        (PersonalField::State, "Nordrhein-Westfalen"),
    ];
    for (field, value) in values {
        wizard.update_personal_field(field, value);
    }
}

pub(super) fn pdf(name: &str, size: u64) -> FileCandidate {
    FileCandidate::new(name, size).with_mime_type("application/pdf")
}

pub(super) fn jpeg(name: &str, size: u64) -> FileCandidate {
    FileCandidate::new(name, size).with_mime_type("image/jpeg")
}

/// Accepts and immediately completes a file, skipping the simulated transfer.
pub(super) fn upload_now(
    wizard: &mut TestWizard,
    slot: SlotId,
    candidate: FileCandidate,
) -> UploadedFileRecord {
    let pending = wizard
        .begin_upload(slot, candidate)
        .expect("upload accepted");
    wizard
        .complete_upload(&pending.file_id)
        .expect("upload completes")
}

pub(super) type WizardFixture = (TestWizard, Arc<InMemoryDraftStore>, ManualClock);

pub(super) fn wizard_on_upload_step(document_type: DocumentType) -> WizardFixture {
    let (mut wizard, store, clock) = fresh_wizard();
    wizard.select_document_type(document_type);
    wizard.next().expect("type selected");
    fill_personal_info(&mut wizard);
    wizard.next().expect("personal info complete");
    assert_eq!(wizard.current_step(), WizardStep::Upload);
    (wizard, store, clock)
}

pub(super) fn upload_required_documents(wizard: &mut TestWizard, document_type: DocumentType) {
    for slot in required_slots(document_type) {
        let candidate = match slot {
            SlotId::BiometricPhoto => jpeg("photo.jpg", 800 * 1024),
            _ => pdf(&format!("{slot}.pdf"), MB),
        };
        upload_now(wizard, slot, candidate);
    }
}

pub(super) fn wizard_on_review_step(document_type: DocumentType) -> WizardFixture {
    let (mut wizard, store, clock) = wizard_on_upload_step(document_type);
    upload_required_documents(&mut wizard, document_type);
    wizard.next().expect("documents complete");
    assert_eq!(wizard.current_step(), WizardStep::Review);
    (wizard, store, clock)
}

pub(super) fn settings() -> SessionSettings {
    SessionSettings {
        autosave_interval: Duration::from_secs(30),
        upload_tick: Duration::from_millis(200),
    }
}

pub(super) struct SessionFixture {
    pub session: TestSession,
    pub store: Arc<InMemoryDraftStore>,
    pub clock: ManualClock,
    pub gateway: Arc<SimulatedGateway>,
    pub navigator: Arc<RecordingNavigator>,
}

pub(super) fn mount_session(store: Arc<InMemoryDraftStore>) -> SessionFixture {
    let clock = clock();
    let gateway = Arc::new(SimulatedGateway::new(Duration::from_millis(2000)));
    let navigator = Arc::new(RecordingNavigator::default());
    let session = WizardSession::mount(
        Arc::clone(&store),
        Arc::new(clock.clone()),
        Arc::clone(&gateway),
        navigator.clone(),
        settings(),
    );

    SessionFixture {
        session,
        store,
        clock,
        gateway,
        navigator,
    }
}

/// Drives a mounted session to the review step with every required document in place.
pub(super) fn session_on_review_step(fixture: &SessionFixture, document_type: DocumentType) {
    fixture.session.with_wizard(|wizard| {
        wizard.select_document_type(document_type);
        wizard.next().expect("type selected");
        fill_personal_info(wizard);
        wizard.next().expect("personal info complete");
        upload_required_documents(wizard, document_type);
        wizard.next().expect("documents complete");
    });
}
