use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::workflows::application::{
    ApplicationDraft, DocumentType, GatewayError, InMemoryDraftStore, PaymentMethod, PhaseLabel,
    RecordingNavigator, SubmissionGateway, SubmitError, SubmittedApplication, WizardSession,
    WizardStep, DASHBOARD_ROUTE, SUBMISSION_FAILED_NOTICE,
};

/// Gateway whose next send panics mid-flight.
#[derive(Default)]
struct CrashingGateway {
    crash_next: AtomicBool,
    accepted: AtomicUsize,
}

impl SubmissionGateway for CrashingGateway {
    async fn send(&self, _application: &SubmittedApplication) -> Result<(), GatewayError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if self.crash_next.swap(false, Ordering::SeqCst) {
            panic!("gateway connection reset");
        }
        self.accepted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn crashing_session(
    store: &Arc<InMemoryDraftStore>,
    gateway: &Arc<CrashingGateway>,
) -> WizardSession<Arc<InMemoryDraftStore>, CrashingGateway> {
    let session = WizardSession::mount(
        Arc::clone(store),
        Arc::new(clock()),
        Arc::clone(gateway),
        Arc::new(RecordingNavigator::default()),
        settings(),
    );
    session.with_wizard(|wizard| {
        wizard.select_document_type(DocumentType::IdCard);
        wizard.next().expect("type selected");
        fill_personal_info(wizard);
        wizard.next().expect("personal info complete");
        upload_required_documents(wizard, DocumentType::IdCard);
        wizard.next().expect("documents complete");
        wizard.select_payment_method(PaymentMethod::Sepa);
    });
    session
}

fn stored_draft(fixture: &SessionFixture) -> ApplicationDraft {
    let raw = fixture.store.snapshot().expect("snapshot written");
    ApplicationDraft::from_snapshot(&raw).expect("snapshot parses")
}

#[tokio::test(start_paused = true)]
async fn nothing_is_saved_before_the_first_interval() {
    let fixture = mount_session(Arc::new(InMemoryDraftStore::default()));
    fixture
        .session
        .with_wizard(|wizard| wizard.select_document_type(DocumentType::IdCard));

    tokio::time::sleep(Duration::from_secs(29)).await;

    assert_eq!(fixture.store.snapshot(), None);
    assert_eq!(fixture.session.view().last_saved, None);
}

#[tokio::test(start_paused = true)]
async fn autosave_refreshes_last_saved_even_without_changes() {
    let fixture = mount_session(Arc::new(InMemoryDraftStore::default()));
    fixture
        .session
        .with_wizard(|wizard| wizard.select_document_type(DocumentType::Passport));

    fixture.clock.advance(chrono::Duration::seconds(30));
    tokio::time::sleep(Duration::from_secs(31)).await;
    let first = stored_draft(&fixture);
    assert_eq!(
        first.last_saved_at,
        Some(start_time() + chrono::Duration::seconds(30))
    );
    assert_eq!(first.selected_document_type, Some(DocumentType::Passport));

    fixture.clock.advance(chrono::Duration::seconds(30));
    tokio::time::sleep(Duration::from_secs(30)).await;
    let second = stored_draft(&fixture);
    assert_eq!(
        second.last_saved_at,
        Some(start_time() + chrono::Duration::seconds(60))
    );
    assert_eq!(
        fixture.session.view().last_saved,
        second.last_saved_at
    );
}

#[tokio::test(start_paused = true)]
async fn remounting_resumes_from_the_saved_draft() {
    let store = Arc::new(InMemoryDraftStore::default());
    let first = mount_session(Arc::clone(&store));
    first.session.with_wizard(|wizard| {
        wizard.select_document_type(DocumentType::DriversLicense);
        wizard.next().expect("type selected");
        fill_personal_info(wizard);
    });
    first.session.save_now().expect("store writable");
    let saved = first.session.with_wizard(|wizard| wizard.draft().clone());
    drop(first);

    let second = mount_session(store);

    let view = second.session.view();
    assert_eq!(view.current_step, WizardStep::PersonalInfo.number());
    assert_eq!(view.selected_document_type, Some(DocumentType::DriversLicense));
    assert_eq!(
        second.session.with_wizard(|wizard| wizard.draft().clone()),
        saved
    );
}

#[tokio::test(start_paused = true)]
async fn submit_waits_for_the_gateway_then_navigates() {
    let fixture = mount_session(Arc::new(InMemoryDraftStore::default()));
    session_on_review_step(&fixture, DocumentType::IdCard);
    fixture.session.with_wizard(|wizard| {
        wizard.select_payment_method(PaymentMethod::Paypal);
    });
    fixture.session.save_now().expect("store writable");
    let started = tokio::time::Instant::now();

    let request = fixture.session.submit().await.expect("submission accepted");

    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert_eq!(request.route, DASHBOARD_ROUTE);
    assert_eq!(fixture.navigator.last(), Some(request.clone()));
    assert_eq!(fixture.gateway.accepted().len(), 1);
    assert_eq!(fixture.store.snapshot(), None);

    let view = fixture.session.view();
    assert_eq!(view.phase, PhaseLabel::Submitted);
    let confirmation = request.state.expect("confirmation state");
    assert_eq!(view.application_number, Some(confirmation.application_number));

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(fixture.store.snapshot(), None);
}

#[tokio::test(start_paused = true)]
async fn concurrent_submits_only_send_once() {
    let fixture = mount_session(Arc::new(InMemoryDraftStore::default()));
    session_on_review_step(&fixture, DocumentType::Passport);
    fixture
        .session
        .with_wizard(|wizard| wizard.select_payment_method(PaymentMethod::Sepa));

    let (first, second) = tokio::join!(fixture.session.submit(), fixture.session.submit());

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|outcome| matches!(outcome, Err(SubmitError::AlreadySubmitting))));
    assert_eq!(fixture.gateway.accepted().len(), 1);
    assert_eq!(fixture.navigator.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_submit_keeps_snapshot_and_can_be_retried() {
    let fixture = mount_session(Arc::new(InMemoryDraftStore::default()));
    session_on_review_step(&fixture, DocumentType::DriversLicense);
    fixture
        .session
        .with_wizard(|wizard| wizard.select_payment_method(PaymentMethod::Paystack));
    fixture.session.save_now().expect("store writable");
    let saved = fixture.store.snapshot();
    fixture.gateway.fail_next();

    let error = fixture.session.submit().await.expect_err("gateway fails");

    assert!(matches!(error, SubmitError::Gateway(_)));
    assert_eq!(error.to_string(), SUBMISSION_FAILED_NOTICE);
    assert_eq!(fixture.store.snapshot(), saved);
    let view = fixture.session.view();
    assert_eq!(view.phase, PhaseLabel::Editing);
    assert_eq!(view.current_step, WizardStep::Review.number());
    assert_eq!(view.notice.as_deref(), Some(SUBMISSION_FAILED_NOTICE));
    assert!(fixture.navigator.requests().is_empty());

    fixture.session.submit().await.expect("retry succeeds");
    assert_eq!(fixture.gateway.accepted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_submit_future_still_completes() {
    let fixture = mount_session(Arc::new(InMemoryDraftStore::default()));
    session_on_review_step(&fixture, DocumentType::IdCard);
    fixture
        .session
        .with_wizard(|wizard| wizard.select_payment_method(PaymentMethod::Coinbase));

    let timed_out =
        tokio::time::timeout(Duration::from_millis(500), fixture.session.submit()).await;
    assert!(timed_out.is_err());
    assert_eq!(fixture.session.view().phase, PhaseLabel::Submitting);

    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(fixture.session.view().phase, PhaseLabel::Submitted);
    assert_eq!(fixture.gateway.accepted().len(), 1);
    assert!(fixture.navigator.last().is_some());
}

#[tokio::test(start_paused = true)]
async fn crashed_send_releases_the_submission_for_retry() {
    let store = Arc::new(InMemoryDraftStore::default());
    let gateway = Arc::new(CrashingGateway::default());
    gateway.crash_next.store(true, Ordering::SeqCst);
    let session = crashing_session(&store, &gateway);
    session.save_now().expect("store writable");
    let saved = store.snapshot();

    let error = session.submit().await.expect_err("send crashed");

    assert!(matches!(error, SubmitError::Gateway(GatewayError::Transport(_))));
    let view = session.view();
    assert_eq!(view.phase, PhaseLabel::Editing);
    assert_eq!(view.notice.as_deref(), Some(SUBMISSION_FAILED_NOTICE));
    assert_eq!(store.snapshot(), saved);

    let request = session.submit().await.expect("retry accepted");
    assert_eq!(request.route, DASHBOARD_ROUTE);
    assert_eq!(gateway.accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn crashed_send_without_a_waiting_caller_is_released() {
    let store = Arc::new(InMemoryDraftStore::default());
    let gateway = Arc::new(CrashingGateway::default());
    gateway.crash_next.store(true, Ordering::SeqCst);
    let session = crashing_session(&store, &gateway);

    let timed_out = tokio::time::timeout(Duration::from_millis(100), session.submit()).await;
    assert!(timed_out.is_err());
    assert_eq!(session.view().phase, PhaseLabel::Submitting);

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(session.view().phase, PhaseLabel::Editing);
    session.submit().await.expect("retry accepted");
    assert_eq!(gateway.accepted.load(Ordering::SeqCst), 1);
}
