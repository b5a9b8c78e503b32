use authencity::config::WizardConfig;
use authencity::workflows::application::{
    Clock, DraftStore, FileCandidate, FileDraftStore, InMemoryDraftStore, RecordingNavigator,
    SimulatedGateway, WizardSession, DEFAULT_DRAFT_KEY,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type PortalSession = WizardSession<Box<dyn DraftStore>, SimulatedGateway>;

struct MountedSession {
    draft_key: String,
    session: Arc<PortalSession>,
    last_seen: Instant,
}

/// Mounted wizard sessions keyed by session id.
///
/// Each draft key has at most one mounted session, so two sessions never race their
/// autosaves into the same store. Drafts live in one JSON file per draft key when a draft
/// directory is configured; otherwise in process memory, shared per key so a reopened
/// session resumes. Sessions idle for longer than the configured timeout are unmounted.
pub(crate) struct SessionRegistry {
    sessions: Mutex<HashMap<String, MountedSession>>,
    memory_drafts: Mutex<HashMap<String, Arc<InMemoryDraftStore>>>,
    config: WizardConfig,
    clock: Arc<dyn Clock>,
    gateway: Arc<SimulatedGateway>,
    navigator: Arc<RecordingNavigator>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub(crate) fn new(config: WizardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            memory_drafts: Mutex::new(HashMap::new()),
            gateway: Arc::new(SimulatedGateway::new(config.submit_latency)),
            navigator: Arc::new(RecordingNavigator::default()),
            config,
            clock,
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn idle_timeout(&self) -> Duration {
        self.config.session_idle_timeout
    }

    /// Mounts a session for `draft_key`, resuming any draft stored under it. A key that
    /// already has a live session gets that session back.
    pub(crate) fn open(&self, draft_key: Option<&str>) -> (String, Arc<PortalSession>) {
        let draft_key = draft_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .unwrap_or(DEFAULT_DRAFT_KEY);
        self.sweep_idle();

        let mut sessions = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned");
        let now = Instant::now();
        if let Some((id, mounted)) = sessions
            .iter_mut()
            .find(|(_, mounted)| mounted.draft_key == draft_key)
        {
            mounted.last_seen = now;
            info!(session_id = %id, draft_key, "draft key already mounted; reusing session");
            return (id.clone(), Arc::clone(&mounted.session));
        }

        let store = self.store_for(draft_key);
        let session = Arc::new(WizardSession::mount(
            store,
            Arc::clone(&self.clock),
            Arc::clone(&self.gateway),
            self.navigator.clone(),
            self.config.session_settings(),
        ));

        let sequence = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = format!("ws-{sequence:06}");
        sessions.insert(
            id.clone(),
            MountedSession {
                draft_key: draft_key.to_string(),
                session: Arc::clone(&session),
                last_seen: now,
            },
        );
        info!(session_id = %id, draft_key, "wizard session mounted");

        (id, session)
    }

    pub(crate) fn get(&self, id: &str) -> Option<Arc<PortalSession>> {
        let mut sessions = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned");
        let now = Instant::now();
        let mounted = sessions.get_mut(id)?;
        if now.duration_since(mounted.last_seen) >= self.config.session_idle_timeout {
            let expired = sessions.remove(id)?;
            drop(sessions);
            expired.session.unmount();
            info!(session_id = %id, "idle wizard session unmounted");
            return None;
        }
        mounted.last_seen = now;
        Some(Arc::clone(&mounted.session))
    }

    /// Unmounts a session. Its stored draft is kept for the next `open`.
    pub(crate) fn close(&self, id: &str) -> bool {
        let removed = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned")
            .remove(id);
        match removed {
            Some(mounted) => {
                mounted.session.unmount();
                info!(session_id = %id, "wizard session unmounted");
                true
            }
            None => false,
        }
    }

    /// Unmounts every session idle for at least the configured timeout.
    pub(crate) fn sweep_idle(&self) -> usize {
        let timeout = self.config.session_idle_timeout;
        let now = Instant::now();
        let expired: Vec<(String, MountedSession)> = {
            let mut sessions = self
                .sessions
                .lock()
                .expect("session registry mutex poisoned");
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, mounted)| now.duration_since(mounted.last_seen) >= timeout)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|mounted| (id, mounted)))
                .collect()
        };

        for (id, mounted) in &expired {
            mounted.session.unmount();
            info!(session_id = %id, draft_key = %mounted.draft_key, "idle wizard session unmounted");
        }
        expired.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions
            .lock()
            .expect("session registry mutex poisoned")
            .len()
    }

    fn store_for(&self, draft_key: &str) -> Box<dyn DraftStore> {
        if let Some(directory) = &self.config.draft_dir {
            return Box::new(FileDraftStore::new(directory, draft_key));
        }

        let mut drafts = self
            .memory_drafts
            .lock()
            .expect("draft map mutex poisoned");
        let store = drafts.entry(draft_key.to_string()).or_default();
        Box::new(Arc::clone(store))
    }
}

/// Periodically unmounts idle sessions. Runs until aborted.
pub(crate) fn spawn_idle_sweeper(registry: Arc<SessionRegistry>) -> tokio::task::JoinHandle<()> {
    let period = registry.idle_timeout().min(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = registry.sweep_idle();
            if evicted > 0 {
                debug!(evicted, live = registry.len(), "idle session sweep");
            }
        }
    })
}

/// Fills in the MIME type from the file name when the client did not send one.
pub(crate) fn with_guessed_mime_type(candidate: FileCandidate) -> FileCandidate {
    if candidate.mime_type.is_some() {
        return candidate;
    }
    match mime_guess::from_path(&candidate.name).first_raw() {
        Some(mime_type) => candidate.with_mime_type(mime_type),
        None => candidate,
    }
}
