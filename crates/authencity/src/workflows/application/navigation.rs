use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use super::domain::{ApplicationNumber, DocumentType};

pub const DASHBOARD_ROUTE: &str = "/dashboard";
pub const SUBMITTED_MESSAGE: &str = "Application Submitted Successfully!";

/// Payload carried to the dashboard after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionConfirmation {
    pub message: String,
    pub application_number: ApplicationNumber,
    pub document_type: DocumentType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationRequest {
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<SubmissionConfirmation>,
}

impl NavigationRequest {
    pub fn dashboard(confirmation: SubmissionConfirmation) -> Self {
        Self {
            route: DASHBOARD_ROUTE.to_string(),
            state: Some(confirmation),
        }
    }
}

/// Routing collaborator invoked once the wizard hands control back to the portal.
pub trait Navigator: Send + Sync {
    fn navigate(&self, request: &NavigationRequest);
}

/// Keeps every request so hosts can report where the applicant was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    requests: Mutex<Vec<NavigationRequest>>,
}

impl RecordingNavigator {
    pub fn requests(&self) -> Vec<NavigationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<NavigationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, request: &NavigationRequest) {
        tracing::info!(route = %request.route, "navigating away from application wizard");
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
    }
}
