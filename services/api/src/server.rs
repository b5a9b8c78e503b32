use crate::cli::ServeArgs;
use crate::infra::{spawn_idle_sweeper, AppState, SessionRegistry};
use crate::routes::with_wizard_routes;
use authencity::config::AppConfig;
use authencity::error::AppError;
use authencity::telemetry;
use authencity::workflows::application::SystemClock;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let registry = Arc::new(SessionRegistry::new(
        config.wizard.clone(),
        Arc::new(SystemClock),
    ));

    let sweeper = spawn_idle_sweeper(Arc::clone(&registry));

    let app = with_wizard_routes(registry)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        autosave_secs = config.wizard.autosave_interval.as_secs(),
        drafts_on_disk = config.wizard.draft_dir.is_some(),
        idle_timeout_secs = config.wizard.session_idle_timeout.as_secs(),
        "document application portal ready"
    );

    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;
    Ok(())
}
