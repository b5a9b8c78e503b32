use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::clock::Clock;
use super::domain::{FileCandidate, FileId, SlotId, UploadedFileRecord};
use super::navigation::{NavigationRequest, Navigator};
use super::review::ReviewSummary;
use super::store::{DraftStore, StoreError};
use super::submission::{GatewayError, SubmissionGateway, SubmittedApplication};
use super::upload::{ProgressIncrements, UploadRejection, UploadSimulator, DEFAULT_UPLOAD_TICK};
use super::views::WizardView;
use super::wizard::{ApplicationWizard, SubmitError};

pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Timing knobs for a mounted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub autosave_interval: Duration,
    pub upload_tick: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            upload_tick: DEFAULT_UPLOAD_TICK,
        }
    }
}

type SharedWizard<S> = Arc<Mutex<ApplicationWizard<S>>>;

fn lock<S>(wizard: &Mutex<ApplicationWizard<S>>) -> MutexGuard<'_, ApplicationWizard<S>> {
    wizard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A mounted wizard together with the tasks that run beside it: the autosave timer, one
/// task per in-flight upload, and the single in-flight submission.
///
/// The controller lock is never held across an `.await`.
pub struct WizardSession<S, G> {
    wizard: SharedWizard<S>,
    gateway: Arc<G>,
    navigator: Arc<dyn Navigator>,
    simulator: UploadSimulator,
    autosave: Mutex<Option<AbortHandle>>,
    uploads: Mutex<HashMap<FileId, AbortHandle>>,
}

impl<S, G> WizardSession<S, G>
where
    S: DraftStore + 'static,
    G: SubmissionGateway + 'static,
{
    /// Mounts the wizard and starts the autosave timer. Must run inside a Tokio runtime.
    pub fn mount(
        store: S,
        clock: Arc<dyn Clock>,
        gateway: Arc<G>,
        navigator: Arc<dyn Navigator>,
        settings: SessionSettings,
    ) -> Self {
        let wizard = Arc::new(Mutex::new(ApplicationWizard::mount(store, clock)));
        let autosave = spawn_autosave(Arc::clone(&wizard), settings.autosave_interval);

        Self {
            wizard,
            gateway,
            navigator,
            simulator: UploadSimulator::new(settings.upload_tick),
            autosave: Mutex::new(Some(autosave)),
            uploads: Mutex::new(HashMap::new()),
        }
    }

    /// Runs a change event against the controller.
    pub fn with_wizard<R>(&self, apply: impl FnOnce(&mut ApplicationWizard<S>) -> R) -> R {
        apply(&mut lock(&self.wizard))
    }

    pub fn view(&self) -> WizardView {
        WizardView::from_wizard(&lock(&self.wizard))
    }

    pub fn review(&self) -> ReviewSummary {
        ReviewSummary::from_draft(lock(&self.wizard).draft())
    }

    pub fn save_now(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        lock(&self.wizard).autosave()
    }

    /// Validates the file against its slot, then starts its simulated transfer.
    pub fn upload<I>(
        &self,
        slot: SlotId,
        candidate: FileCandidate,
        increments: I,
    ) -> Result<UploadHandle, UploadRejection>
    where
        I: ProgressIncrements + 'static,
    {
        let pending = self.with_wizard(|wizard| wizard.begin_upload(slot, candidate))?;
        let file_id = pending.file_id.clone();
        let wizard = Arc::clone(&self.wizard);
        let simulator = self.simulator;

        let task = tokio::spawn(async move {
            let guard = InFlightGuard {
                wizard: Arc::clone(&wizard),
                file_id: pending.file_id.clone(),
                armed: true,
            };
            simulator
                .run(increments, |percent| {
                    lock(&wizard).report_upload_progress(&pending.file_id, percent);
                })
                .await;
            guard.complete()
        });

        let mut uploads = self.uploads.lock().unwrap_or_else(PoisonError::into_inner);
        uploads.retain(|_, handle| !handle.is_finished());
        uploads.insert(file_id.clone(), task.abort_handle());

        Ok(UploadHandle { file_id, task })
    }

    /// Aborts an in-flight upload; the draft is left as if the file was never dropped.
    pub fn cancel_upload(&self, file_id: &FileId) -> bool {
        let handle = self
            .uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(file_id);
        if let Some(handle) = &handle {
            handle.abort();
        }
        let removed = lock(&self.wizard).cancel_upload(file_id);
        handle.is_some() || removed
    }

    pub fn remove_file(&self, file_id: &FileId) -> Option<UploadedFileRecord> {
        lock(&self.wizard).remove_file(file_id)
    }

    /// Submits the reviewed application.
    ///
    /// The send runs on its own task, so dropping this future does not abandon a submission
    /// that already started.
    pub async fn submit(&self) -> Result<NavigationRequest, SubmitError> {
        let application = self.with_wizard(|wizard| wizard.begin_submit())?;
        let wizard = Arc::clone(&self.wizard);
        let gateway = Arc::clone(&self.gateway);
        let navigator = Arc::clone(&self.navigator);

        let flight = tokio::spawn(async move {
            let mut guard = SubmitGuard {
                wizard: Arc::clone(&wizard),
                application: Some(application.clone()),
            };
            let outcome = gateway.send(&application).await;
            guard.application = None;
            let result = lock(&wizard).finish_submit(&application, outcome);
            if let Ok(request) = &result {
                navigator.navigate(request);
            }
            result
        });

        match flight.await {
            Ok(Ok(request)) => {
                self.stop_autosave();
                Ok(request)
            }
            Ok(Err(err)) => Err(err),
            Err(join_error) => {
                warn!(error = %join_error, "submission task ended unexpectedly");
                Err(SubmitError::Gateway(GatewayError::Transport(format!(
                    "submission task ended unexpectedly: {join_error}"
                ))))
            }
        }
    }
}

impl<S, G> WizardSession<S, G> {
    /// Stops the autosave timer and every upload task.
    pub fn unmount(&self) {
        self.stop_autosave();
        let mut uploads = self.uploads.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in uploads.drain() {
            handle.abort();
        }
    }

    fn stop_autosave(&self) {
        if let Some(handle) = self
            .autosave
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl<S, G> Drop for WizardSession<S, G> {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn spawn_autosave<S>(wizard: SharedWizard<S>, period: Duration) -> AbortHandle
where
    S: DraftStore + 'static,
{
    let period = if period.is_zero() {
        DEFAULT_AUTOSAVE_INTERVAL
    } else {
        period
    };

    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let result = lock(&wizard).autosave();
            match result {
                Ok(Some(saved_at)) => debug!(%saved_at, "autosave completed"),
                Ok(None) => break,
                Err(err) => warn!(error = %err, "autosave failed; keeping previous snapshot"),
            }
        }
    });

    task.abort_handle()
}

/// Clears the in-flight entry if the upload task is dropped before completing.
struct InFlightGuard<S: DraftStore> {
    wizard: SharedWizard<S>,
    file_id: FileId,
    armed: bool,
}

impl<S: DraftStore> InFlightGuard<S> {
    fn complete(mut self) -> Option<UploadedFileRecord> {
        self.armed = false;
        lock(&self.wizard).complete_upload(&self.file_id)
    }
}

impl<S: DraftStore> Drop for InFlightGuard<S> {
    fn drop(&mut self) {
        if self.armed {
            lock(&self.wizard).cancel_upload(&self.file_id);
        }
    }
}

/// Fails the pending submission if the send never returns, so the applicant can retry.
struct SubmitGuard<S: DraftStore> {
    wizard: SharedWizard<S>,
    application: Option<SubmittedApplication>,
}

impl<S: DraftStore> Drop for SubmitGuard<S> {
    fn drop(&mut self) {
        let Some(application) = self.application.take() else {
            return;
        };
        let mut wizard = lock(&self.wizard);
        if wizard.is_submitting() {
            let interrupted =
                GatewayError::Transport("submission was interrupted before completing".to_string());
            let _ = wizard.finish_submit(&application, Err(interrupted));
        }
    }
}

/// Handle to one simulated upload task.
#[derive(Debug)]
pub struct UploadHandle {
    file_id: FileId,
    task: JoinHandle<Option<UploadedFileRecord>>,
}

impl UploadHandle {
    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the transfer. `None` when it was aborted or the application was submitted
    /// before the file landed.
    pub async fn finished(self) -> Option<UploadedFileRecord> {
        match self.task.await {
            Ok(record) => record,
            Err(err) => {
                if !err.is_cancelled() {
                    warn!(file_id = %self.file_id, error = %err, "upload task failed");
                }
                None
            }
        }
    }
}
