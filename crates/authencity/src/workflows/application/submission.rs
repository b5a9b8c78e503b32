use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationNumber, DocumentType, PaymentMethod, PersonalInfo, UploadedFileRecord,
};

/// Composite record sent when the applicant confirms the review step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedApplication {
    pub application_number: ApplicationNumber,
    pub document_type: DocumentType,
    pub personal_info: PersonalInfo,
    pub uploaded_files: Vec<UploadedFileRecord>,
    pub payment_method: PaymentMethod,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("submission transport unavailable: {0}")]
    Transport(String),
    #[error("submission rejected: {0}")]
    Rejected(String),
}

/// Outbound "send" of a finished application.
pub trait SubmissionGateway: Send + Sync {
    fn send(
        &self,
        application: &SubmittedApplication,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Gateway that only waits out a fixed latency, optionally failing afterwards.
#[derive(Debug, Default)]
pub struct SimulatedGateway {
    latency: Duration,
    fail_next: AtomicBool,
    accepted: Mutex<Vec<SubmittedApplication>>,
}

impl SimulatedGateway {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Makes the next `send` fail after its latency elapses.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn accepted(&self) -> Vec<SubmittedApplication> {
        self.accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl SubmissionGateway for SimulatedGateway {
    async fn send(&self, application: &SubmittedApplication) -> Result<(), GatewayError> {
        tokio::time::sleep(self.latency).await;

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Transport(
                "simulated network failure".to_string(),
            ));
        }

        self.accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(application.clone());
        Ok(())
    }
}
