use crate::infra::{with_guessed_mime_type, AppState, PortalSession, SessionRegistry};
use authencity::error::AppError;
use authencity::workflows::application::{
    slots_for, DocumentType, FileCandidate, FileId, PaymentMethod, PersonalField,
    RandomIncrements, SlotId, SubmitError, UploadRejection, WizardView,
};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OpenSessionRequest {
    #[serde(default)]
    pub(crate) draft_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionCreated {
    pub(crate) session_id: String,
    pub(crate) view: WizardView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentTypeRequest {
    pub(crate) document_type: DocumentType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PaymentMethodRequest {
    pub(crate) payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadRequest {
    pub(crate) slot: SlotId,
    pub(crate) name: String,
    pub(crate) size: u64,
    #[serde(default)]
    pub(crate) mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadAccepted {
    pub(crate) file_id: FileId,
    pub(crate) slot: SlotId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequirementView {
    pub(crate) slot: SlotId,
    pub(crate) label: &'static str,
    pub(crate) required: bool,
    pub(crate) max_size: String,
    pub(crate) formats: &'static [&'static str],
}

/// Wizard endpoints under `/api/v1/wizard`.
pub(crate) fn wizard_router(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/api/v1/wizard/sessions", post(open_session))
        .route(
            "/api/v1/wizard/sessions/:session_id",
            get(session_view).delete(close_session),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/document-type",
            put(select_document_type),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/personal-info",
            axum::routing::patch(update_personal_info),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/payment-method",
            put(select_payment_method),
        )
        .route("/api/v1/wizard/sessions/:session_id/next", post(next_step))
        .route(
            "/api/v1/wizard/sessions/:session_id/previous",
            post(previous_step),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/uploads",
            post(start_upload),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/uploads/:file_id",
            delete(remove_upload),
        )
        .route("/api/v1/wizard/sessions/:session_id/save", post(save_draft))
        .route(
            "/api/v1/wizard/sessions/:session_id/submit",
            post(submit_application),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/review",
            get(review_summary),
        )
        .route(
            "/api/v1/wizard/requirements/:document_type",
            get(document_requirements),
        )
        .with_state(registry)
}

pub(crate) fn with_wizard_routes(registry: Arc<SessionRegistry>) -> Router {
    wizard_router(registry)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, Json(payload)).into_response()
}

fn lookup(registry: &SessionRegistry, session_id: &str) -> Result<Arc<PortalSession>, Response> {
    registry.get(session_id).ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            format!("wizard session '{session_id}' not found"),
        )
    })
}

fn view_response(status: StatusCode, session: &PortalSession) -> Response {
    (status, Json(session.view())).into_response()
}

pub(crate) async fn open_session(
    State(registry): State<Arc<SessionRegistry>>,
    body: Option<Json<OpenSessionRequest>>,
) -> Response {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let (session_id, session) = registry.open(request.draft_key.as_deref());
    let payload = SessionCreated {
        session_id,
        view: session.view(),
    };
    (StatusCode::CREATED, Json(payload)).into_response()
}

pub(crate) async fn session_view(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    match lookup(&registry, &session_id) {
        Ok(session) => view_response(StatusCode::OK, &session),
        Err(response) => response,
    }
}

pub(crate) async fn close_session(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    if registry.close(&session_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            format!("wizard session '{session_id}' not found"),
        )
    }
}

pub(crate) async fn select_document_type(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    Json(request): Json<DocumentTypeRequest>,
) -> Response {
    let session = match lookup(&registry, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    session.with_wizard(|wizard| wizard.select_document_type(request.document_type));
    view_response(StatusCode::OK, &session)
}

pub(crate) async fn update_personal_info(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    Json(fields): Json<BTreeMap<String, String>>,
) -> Response {
    let session = match lookup(&registry, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let mut updates = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        match key.parse::<PersonalField>() {
            Ok(field) => updates.push((field, value)),
            Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
        }
    }

    session.with_wizard(|wizard| {
        for (field, value) in updates {
            wizard.update_personal_field(field, value);
        }
    });
    view_response(StatusCode::OK, &session)
}

pub(crate) async fn select_payment_method(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    Json(request): Json<PaymentMethodRequest>,
) -> Response {
    let session = match lookup(&registry, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    session.with_wizard(|wizard| wizard.select_payment_method(request.payment_method));
    view_response(StatusCode::OK, &session)
}

pub(crate) async fn next_step(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    let session = match lookup(&registry, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match session.with_wizard(|wizard| wizard.next()) {
        Ok(_) => view_response(StatusCode::OK, &session),
        Err(_) => view_response(StatusCode::UNPROCESSABLE_ENTITY, &session),
    }
}

pub(crate) async fn previous_step(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    let session = match lookup(&registry, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    session.with_wizard(|wizard| wizard.previous());
    view_response(StatusCode::OK, &session)
}

pub(crate) async fn start_upload(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    Json(request): Json<UploadRequest>,
) -> Response {
    let session = match lookup(&registry, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let candidate = FileCandidate {
        name: request.name,
        size: request.size,
        mime_type: request.mime_type,
    };
    let candidate = with_guessed_mime_type(candidate);

    match session.upload(request.slot, candidate, RandomIncrements::from_entropy()) {
        Ok(handle) => {
            let payload = UploadAccepted {
                file_id: handle.file_id().clone(),
                slot: request.slot,
            };
            (StatusCode::ACCEPTED, Json(payload)).into_response()
        }
        Err(
            rejection @ (UploadRejection::NotOnUploadStep
            | UploadRejection::NoDocumentType
            | UploadRejection::AlreadySubmitted),
        ) => error_response(StatusCode::CONFLICT, rejection.to_string()),
        Err(rejection) => error_response(StatusCode::UNPROCESSABLE_ENTITY, rejection.to_string()),
    }
}

pub(crate) async fn remove_upload(
    State(registry): State<Arc<SessionRegistry>>,
    Path((session_id, file_id)): Path<(String, String)>,
) -> Response {
    let session = match lookup(&registry, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let file_id = FileId(file_id);
    let cancelled = session.cancel_upload(&file_id);
    let removed = session.remove_file(&file_id).is_some();
    if cancelled || removed {
        view_response(StatusCode::OK, &session)
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            format!("file '{file_id}' not found in this application"),
        )
    }
}

pub(crate) async fn save_draft(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    let session = match lookup(&registry, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };
    match session.save_now() {
        Ok(Some(saved_at)) => {
            (StatusCode::OK, Json(json!({ "lastSaved": saved_at }))).into_response()
        }
        Ok(None) => error_response(
            StatusCode::CONFLICT,
            "the application has already been submitted",
        ),
        Err(err) => {
            warn!(session_id = %session_id, error = %err, "manual save failed");
            AppError::from(err).into_response()
        }
    }
}

pub(crate) async fn submit_application(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    let session = match lookup(&registry, &session_id) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match session.submit().await {
        Ok(navigation) => {
            let payload = json!({
                "navigation": navigation,
                "view": session.view(),
            });
            registry.close(&session_id);
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(SubmitError::Invalid(errors)) => {
            let payload = json!({
                "error": "the application has validation errors",
                "errors": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        Err(
            err @ (SubmitError::NotOnReviewStep { .. }
            | SubmitError::AlreadySubmitting
            | SubmitError::AlreadySubmitted),
        ) => error_response(StatusCode::CONFLICT, err.to_string()),
        Err(err @ SubmitError::Gateway(_)) => {
            error_response(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

pub(crate) async fn review_summary(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Response {
    match lookup(&registry, &session_id) {
        Ok(session) => (StatusCode::OK, Json(session.review())).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn document_requirements(Path(document_type): Path<String>) -> Response {
    let document_type = match document_type.parse::<DocumentType>() {
        Ok(document_type) => document_type,
        Err(err) => return error_response(StatusCode::NOT_FOUND, err.to_string()),
    };

    let slots: Vec<RequirementView> = slots_for(document_type)
        .into_iter()
        .map(|requirement| RequirementView {
            slot: requirement.slot,
            label: requirement.slot.label(),
            required: requirement.required,
            max_size: requirement.max_size_label(),
            formats: requirement.formats,
        })
        .collect();

    let payload = json!({
        "documentType": document_type,
        "label": document_type.label(),
        "fee": document_type.fee_label(),
        "processingTime": document_type.processing_time(),
        "slots": slots,
    });
    (StatusCode::OK, Json(payload)).into_response()
}
