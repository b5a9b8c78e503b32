use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::workflows::application::{
    DocumentType, FixedIncrements, InMemoryDraftStore, ScriptedIncrements, SlotId,
    UploadRejection,
};

fn session_on_upload_step(document_type: DocumentType) -> SessionFixture {
    let fixture = mount_session(Arc::new(InMemoryDraftStore::default()));
    fixture.session.with_wizard(|wizard| {
        wizard.select_document_type(document_type);
        wizard.next().expect("type selected");
        fill_personal_info(wizard);
        wizard.next().expect("personal info complete");
    });
    fixture
}

#[tokio::test(start_paused = true)]
async fn upload_reports_progress_then_lands_in_the_draft() {
    let fixture = session_on_upload_step(DocumentType::IdCard);

    let handle = fixture
        .session
        .upload(
            SlotId::ProofOfResidence,
            pdf("bill.pdf", 3 * MB),
            FixedIncrements::new(25.0),
        )
        .expect("upload accepted");

    tokio::time::sleep(Duration::from_millis(450)).await;
    let view = fixture.session.view();
    assert_eq!(view.uploads_in_flight.len(), 1);
    assert_eq!(view.uploads_in_flight[0].percent, 50);
    assert!(view.uploaded_files.is_empty());

    let record = handle.finished().await.expect("upload completes");
    let view = fixture.session.view();
    assert!(view.uploads_in_flight.is_empty());
    assert_eq!(view.uploaded_files, vec![record.clone()]);
    assert_eq!(record.name, "bill.pdf");
    assert_eq!(record.mime_type, "application/pdf");
    assert_eq!(record.uploaded_at, start_time());
}

#[tokio::test(start_paused = true)]
async fn rejected_files_never_start_a_transfer() {
    let fixture = session_on_upload_step(DocumentType::IdCard);

    let rejection = fixture
        .session
        .upload(
            SlotId::BirthCertificate,
            pdf("scan.pdf", 10 * MB),
            FixedIncrements::new(50.0),
        )
        .expect_err("too large");

    assert!(matches!(rejection, UploadRejection::FileTooLarge { .. }));
    assert!(fixture.session.view().uploads_in_flight.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelling_an_upload_leaves_files_unchanged() {
    let fixture = session_on_upload_step(DocumentType::IdCard);
    let kept = fixture
        .session
        .upload(SlotId::BiometricPhoto, jpeg("photo.jpg", 1024), ScriptedIncrements::default())
        .expect("upload accepted")
        .finished()
        .await
        .expect("photo uploaded");

    let handle = fixture
        .session
        .upload(
            SlotId::BirthCertificate,
            pdf("birth.pdf", MB),
            FixedIncrements::new(10.0),
        )
        .expect("upload accepted");
    tokio::time::sleep(Duration::from_millis(650)).await;
    let file_id = handle.file_id().clone();

    assert!(fixture.session.cancel_upload(&file_id));
    assert!(handle.finished().await.is_none());

    let view = fixture.session.view();
    assert!(view.uploads_in_flight.is_empty());
    assert_eq!(view.uploaded_files, vec![kept]);
}

#[tokio::test(start_paused = true)]
async fn aborted_task_clears_its_in_flight_entry() {
    let fixture = session_on_upload_step(DocumentType::Passport);
    let handle = fixture
        .session
        .upload(
            SlotId::PreviousPassport,
            pdf("old-passport.pdf", MB),
            FixedIncrements::new(5.0),
        )
        .expect("upload accepted");
    tokio::time::sleep(Duration::from_millis(400)).await;

    handle.abort();
    assert!(handle.finished().await.is_none());

    let view = fixture.session.view();
    assert!(view.uploads_in_flight.is_empty());
    assert!(view.uploaded_files.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unmount_stops_pending_uploads() {
    let fixture = session_on_upload_step(DocumentType::DriversLicense);
    fixture
        .session
        .upload(
            SlotId::MedicalCertificate,
            pdf("medical.pdf", MB),
            FixedIncrements::new(1.0),
        )
        .expect("upload accepted");
    tokio::time::sleep(Duration::from_millis(600)).await;

    fixture.session.unmount();
    tokio::time::sleep(Duration::from_secs(60)).await;

    let view = fixture.session.view();
    assert!(view.uploads_in_flight.is_empty());
    assert!(view.uploaded_files.is_empty());
    assert_eq!(fixture.store.snapshot(), None);
}
