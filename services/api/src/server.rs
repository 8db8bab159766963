use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_evaluation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use coalition_eval::config::AppConfig;
use coalition_eval::error::AppError;
use coalition_eval::telemetry;
use coalition_eval::workflows::evaluation::{
    verify_weights, BroadcastRefresh, EvaluationService, HttpEvaluationBackend,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;
    verify_weights()?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backend = Arc::new(HttpEvaluationBackend::new(&config.backend)?);
    let refresh = Arc::new(BroadcastRefresh::default());
    spawn_refresh_log(&refresh);
    let evaluation_service = Arc::new(EvaluationService::new(
        backend,
        refresh,
        config.evaluation,
    ));

    let app = with_evaluation_routes(evaluation_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        backend = %config.backend.base_url,
        auto_scoring = config.evaluation.auto_scoring,
        merge_policy = ?config.evaluation.merge_policy,
        "coalition evaluation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Logs every dashboard refresh published after a stored evaluation.
fn spawn_refresh_log(refresh: &BroadcastRefresh) {
    let mut events = refresh.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(
                    subject = %event.subject_user_id,
                    evaluation_id = ?event.evaluation_id,
                    total_score = event.total_score,
                    "dashboard refresh published"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "dashboard refresh log fell behind")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
