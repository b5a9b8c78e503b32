use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authencity::workflows::application::{
    required_slots, ApplicationWizard, DocumentType, DraftStore, FileCandidate, FileDraftStore,
    ManualClock, PaymentMethod, PersonalField, RandomIncrements, RecordingNavigator,
    SessionSettings, SimulatedGateway, SlotId, StoreError, WizardSession, WizardStep,
    DASHBOARD_ROUTE, SUBMITTED_MESSAGE,
};
use chrono::{TimeZone, Utc};

fn clock() -> ManualClock {
    ManualClock::starting_at(
        Utc.with_ymd_and_hms(2025, 6, 2, 8, 30, 0)
            .single()
            .expect("valid start"),
    )
}

fn personal_info() -> [(PersonalField, &'static str); 12] {
    [
        (PersonalField::FirstName, "Jonas"),
        (PersonalField::LastName, "Becker"),
        (PersonalField::DateOfBirth, "1991-02-17"),
        (PersonalField::PlaceOfBirth, "Leipzig"),
        (PersonalField::Nationality, "German"),
        (PersonalField::Gender, "male"),
        (PersonalField::Email, "jonas.becker@example.de"),
        (PersonalField::Phone, "+49 341 555010"),
        (PersonalField::Street, "Karl-Liebknecht-Straße 9"),
        (PersonalField::PostalCode, "04107"),
        (PersonalField::City, "Leipzig"),
        (PersonalField::State, "Sachsen"),
    ]
}

fn candidate_for(slot: SlotId) -> FileCandidate {
    match slot {
        SlotId::BiometricPhoto => {
            FileCandidate::new("portrait.png", 900 * 1024).with_mime_type("image/png")
        }
        other => FileCandidate::new(format!("{other}.pdf"), 2 * 1024 * 1024)
            .with_mime_type("application/pdf"),
    }
}

/// Store whose writes can be switched off, to observe failed autosaves.
#[derive(Default)]
struct FlakyStore {
    inner: std::sync::Mutex<Option<String>>,
    failing: AtomicBool,
}

impl DraftStore for FlakyStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().expect("store mutex poisoned").clone())
    }

    fn save(&self, snapshot: &str) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("quota exceeded".to_string()));
        }
        *self.inner.lock().expect("store mutex poisoned") = Some(snapshot.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.inner.lock().expect("store mutex poisoned") = None;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn drivers_license_application_survives_a_reload_and_submits() {
    let drafts = tempfile::tempdir().expect("temp dir");
    let clock = clock();
    let gateway = Arc::new(SimulatedGateway::new(Duration::from_millis(2000)));
    let navigator = Arc::new(RecordingNavigator::default());
    let settings = SessionSettings::default();
    let store = FileDraftStore::new(drafts.path(), "documentApplicationForm");

    let session = WizardSession::mount(
        store.clone(),
        Arc::new(clock.clone()),
        Arc::clone(&gateway),
        navigator.clone(),
        settings,
    );
    session.with_wizard(|wizard| {
        wizard.select_document_type(DocumentType::DriversLicense);
        wizard.next().expect("type selected");
        for (field, value) in personal_info() {
            wizard.update_personal_field(field, value);
        }
        wizard.next().expect("personal info valid");
    });

    let slots = required_slots(DocumentType::DriversLicense);
    assert_eq!(slots.len(), 5);
    for (seed, slot) in slots.iter().enumerate() {
        let record = session
            .upload(*slot, candidate_for(*slot), RandomIncrements::seeded(seed as u64))
            .expect("upload accepted")
            .finished()
            .await
            .expect("upload completes");
        assert_eq!(record.slot, *slot);
    }

    clock.advance(chrono::Duration::seconds(45));
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(store.path().exists());
    let saved = session.with_wizard(|wizard| wizard.draft().clone());
    assert!(saved.last_saved_at.is_some());
    drop(session);

    let session = WizardSession::mount(
        store.clone(),
        Arc::new(clock.clone()),
        Arc::clone(&gateway),
        navigator.clone(),
        settings,
    );
    let view = session.view();
    assert_eq!(view.current_step, WizardStep::Upload.number());
    assert_eq!(view.uploaded_files.len(), 5);
    assert_eq!(
        session.with_wizard(|wizard| wizard.draft().clone()),
        saved
    );

    session.with_wizard(|wizard| {
        wizard.next().expect("documents complete");
        wizard.select_payment_method(PaymentMethod::Sepa);
    });
    let review = session.review();
    assert_eq!(review.documents.len(), 5);
    assert_eq!(review.payment_method, Some("SEPA Bank Transfer"));
    assert_eq!(
        review.document.expect("document summary").fee,
        "€149.99"
    );

    let request = session.submit().await.expect("submission accepted");

    assert_eq!(request.route, DASHBOARD_ROUTE);
    let confirmation = request.state.expect("confirmation");
    assert_eq!(confirmation.message, SUBMITTED_MESSAGE);
    assert!(confirmation.application_number.0.starts_with("APP-"));
    assert!(!store.path().exists());
    assert_eq!(gateway.accepted().len(), 1);
    assert_eq!(gateway.accepted()[0].uploaded_files.len(), 5);
    assert_eq!(navigator.requests().len(), 1);
}

#[test]
fn failed_autosave_keeps_previous_last_saved() {
    let store = Arc::new(FlakyStore::default());
    let clock = clock();
    let mut wizard = ApplicationWizard::mount(Arc::clone(&store), Arc::new(clock.clone()));
    wizard.select_document_type(DocumentType::IdCard);

    let first = wizard
        .autosave()
        .expect("store writable")
        .expect("still editing");

    store.failing.store(true, Ordering::SeqCst);
    clock.advance(chrono::Duration::seconds(30));
    wizard.select_document_type(DocumentType::Passport);

    assert!(wizard.autosave().is_err());
    assert_eq!(wizard.last_saved_at(), Some(first));

    let resumed = ApplicationWizard::mount(Arc::clone(&store), Arc::new(clock));
    assert_eq!(
        resumed.draft().selected_document_type,
        Some(DocumentType::IdCard)
    );
}
