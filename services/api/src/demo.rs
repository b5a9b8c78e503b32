use crate::infra::with_guessed_mime_type;
use authencity::error::AppError;
use authencity::workflows::application::{
    format_file_size, slots_for, DocumentType, DraftStore, FileCandidate, FileDraftStore,
    FixedIncrements, InMemoryDraftStore, ManualClock, PaymentMethod, PersonalField,
    RecordingNavigator, ReviewSummary, SessionSettings, SimulatedGateway, SlotId, WizardSession,
    DEFAULT_DRAFT_KEY,
};
use chrono::{TimeZone, Utc};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Document to apply for: id-card, passport or drivers-license
    #[arg(long, default_value = "passport", value_parser = parse_document_type)]
    pub(crate) document_type: DocumentType,
    /// Payment provider: paypal, sepa, paystack or coinbase
    #[arg(long, default_value = "sepa", value_parser = parse_payment_method)]
    pub(crate) payment_method: PaymentMethod,
    /// Let the first submission attempt fail to show the retry path
    #[arg(long)]
    pub(crate) fail_first_submit: bool,
    /// Persist the draft as JSON in this directory instead of memory
    #[arg(long)]
    pub(crate) draft_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct RequirementsArgs {
    /// Limit the listing to one document type
    #[arg(long, value_parser = parse_document_type)]
    pub(crate) document_type: Option<DocumentType>,
}

pub(crate) fn parse_document_type(raw: &str) -> Result<DocumentType, String> {
    raw.parse::<DocumentType>().map_err(|err| err.to_string())
}

pub(crate) fn parse_payment_method(raw: &str) -> Result<PaymentMethod, String> {
    raw.parse::<PaymentMethod>().map_err(|err| err.to_string())
}

pub(crate) fn run_requirements(args: RequirementsArgs) {
    let document_types = match args.document_type {
        Some(document_type) => vec![document_type],
        None => DocumentType::ordered().to_vec(),
    };

    for document_type in document_types {
        println!(
            "{} ({}) | fee {} | processing {}",
            document_type.label(),
            document_type,
            document_type.fee_label(),
            document_type.processing_time()
        );
        for requirement in slots_for(document_type) {
            println!(
                "  - {} [{}] max {} | formats {}",
                requirement.slot.label(),
                if requirement.required {
                    "required"
                } else {
                    "optional"
                },
                requirement.max_size_label(),
                requirement.formats.join(", ")
            );
        }
    }
}

fn demo_personal_info() -> [(PersonalField, &'static str); 12] {
    [
        (PersonalField::FirstName, "Mara"),
        (PersonalField::LastName, "Schneider"),
        (PersonalField::DateOfBirth, "1990-04-21"),
        (PersonalField::PlaceOfBirth, "Hamburg"),
        (PersonalField::Nationality, "German"),
        (PersonalField::Gender, "female"),
        (PersonalField::Email, "mara.schneider@example"),
        (PersonalField::Phone, "+49 40 123456"),
        (PersonalField::Street, "Jungfernstieg 7"),
        (PersonalField::PostalCode, "20354"),
        (PersonalField::City, "Hamburg"),
        (PersonalField::State, "Hamburg"),
    ]
}

fn demo_file(slot: SlotId) -> FileCandidate {
    let candidate = match slot {
        SlotId::BiometricPhoto => FileCandidate::new("passport-photo.jpg", 820 * 1024),
        SlotId::ProofOfResidence => FileCandidate::new("meldebescheinigung.pdf", 1_310_720),
        SlotId::BirthCertificate => FileCandidate::new("geburtsurkunde.pdf", 2_097_152),
        SlotId::PreviousPassport => FileCandidate::new("old-passport.png", 1_572_864),
        SlotId::MedicalCertificate => FileCandidate::new("medical-report.pdf", 734_003),
        SlotId::DrivingTest => FileCandidate::new("driving-test-result.pdf", 512_000),
    };
    with_guessed_mime_type(candidate)
}

/// Scripted walk through the wizard on a manual clock. Uploads and the gateway still run
/// as tasks, with shortened timers.
pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        document_type,
        payment_method,
        fail_first_submit,
        draft_dir,
    } = args;

    let clock = ManualClock::starting_at(
        Utc.with_ymd_and_hms(2025, 5, 12, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now),
    );
    let store: Box<dyn DraftStore> = match &draft_dir {
        Some(directory) => Box::new(FileDraftStore::new(directory, DEFAULT_DRAFT_KEY)),
        None => Box::new(InMemoryDraftStore::default()),
    };
    let gateway = Arc::new(SimulatedGateway::new(Duration::from_millis(250)));
    let navigator = Arc::new(RecordingNavigator::default());
    let session = WizardSession::mount(
        store,
        Arc::new(clock.clone()),
        Arc::clone(&gateway),
        navigator.clone(),
        SessionSettings {
            autosave_interval: Duration::from_secs(30),
            upload_tick: Duration::from_millis(20),
        },
    );

    println!("Document application demo");
    println!(
        "Applying for: {} ({}, {})",
        document_type.label(),
        document_type.fee_label(),
        document_type.processing_time()
    );

    println!("\nStep 1: choose a document");
    if let Err(errors) = session.with_wizard(|wizard| wizard.next()) {
        for message in errors.messages() {
            println!("  Blocked: {message}");
        }
    }
    let step = session.with_wizard(|wizard| {
        wizard.select_document_type(document_type);
        wizard.next()
    });
    if let Ok(step) = step {
        println!("  Selected {document_type}; moved to step {}", step.number());
    }

    println!("\nStep 2: personal information");
    let attempt = session.with_wizard(|wizard| {
        for (field, value) in demo_personal_info() {
            wizard.update_personal_field(field, value);
        }
        wizard.next()
    });
    if let Err(errors) = attempt {
        for (field, error) in errors.iter() {
            println!("  Blocked on {}: {error}", field.key());
        }
    }
    let step = session.with_wizard(|wizard| {
        wizard.update_personal_field(PersonalField::Email, "mara.schneider@example.de");
        wizard.next()
    });
    if let Ok(step) = step {
        println!("  Email corrected; moved to step {}", step.number());
    }

    println!("\nStep 3: documents");
    let oversized = FileCandidate::new("scan-600dpi.pdf", 10 * 1024 * 1024);
    if let Err(rejection) = session.upload(
        SlotId::ProofOfResidence,
        oversized,
        FixedIncrements::new(20.0),
    ) {
        println!("  Rejected scan-600dpi.pdf: {rejection}");
    }
    for requirement in slots_for(document_type) {
        let handle = match session.upload(
            requirement.slot,
            demo_file(requirement.slot),
            FixedIncrements::new(20.0),
        ) {
            Ok(handle) => handle,
            Err(rejection) => {
                println!("  Rejected {}: {rejection}", requirement.slot);
                continue;
            }
        };
        if let Some(record) = handle.finished().await {
            println!(
                "  Uploaded {} -> {} ({})",
                record.name,
                requirement.slot.label(),
                format_file_size(record.size)
            );
        }
    }

    clock.advance(chrono::Duration::seconds(30));
    if let Some(saved_at) = session.save_now()? {
        println!("  Draft saved at {}", saved_at.to_rfc3339());
    }
    if let Some(directory) = &draft_dir {
        println!("  Draft file: {}", directory.display());
    }

    match session.with_wizard(|wizard| wizard.next()) {
        Ok(step) => println!("  All required documents present; moved to step {}", step.number()),
        Err(errors) => {
            for message in errors.messages() {
                println!("  Blocked: {message}");
            }
            return Ok(());
        }
    }

    println!("\nStep 4: review and payment");
    render_review(&session.review());

    if let Err(err) = session.submit().await {
        println!("  Submit blocked: {err}");
    }
    session.with_wizard(|wizard| wizard.select_payment_method(payment_method));
    println!("  Paying with {}", payment_method.label());

    if fail_first_submit {
        gateway.fail_next();
        if let Err(err) = session.submit().await {
            println!("  Submission failed: {err}");
        }
    }

    match session.submit().await {
        Ok(request) => {
            println!("\n{}", navigator.last().map_or(request.route.clone(), |last| last.route));
            if let Some(confirmation) = request.state {
                println!(
                    "{} Application number {} ({})",
                    confirmation.message,
                    confirmation.application_number,
                    confirmation.document_type.label()
                );
            }
        }
        Err(err) => println!("  Submission failed: {err}"),
    }

    session.unmount();
    Ok(())
}

fn render_review(summary: &ReviewSummary) {
    if let Some(document) = &summary.document {
        println!(
            "  {} | fee {} | {}",
            document.label, document.fee, document.processing_time
        );
    }
    for field in &summary.personal_info {
        println!("  {}: {}", field.label, field.value);
    }
    for group in &summary.documents {
        let files = group
            .files
            .iter()
            .map(|file| format!("{} ({})", file.name, file.size))
            .collect::<Vec<_>>();
        let files = if files.is_empty() {
            "none".to_string()
        } else {
            files.join(", ")
        };
        println!("  {}: {}", group.label, files);
    }
}
