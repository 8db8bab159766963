use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::backend::{BackendError, EvaluationBackend, RefreshPublisher};
use super::catalog::{CriterionId, KpiCategory, Section};
use super::descriptor::catalog_view;
use super::domain::{EvaluationData, EvaluationPeriod, SubjectId};
use super::metrics::MetricsPayload;
use super::preview::score_preview;
use super::service::{EvaluationService, EvaluationServiceError, SessionId};
use super::session::SessionError;

/// Router exposing the criteria catalog, stateless previews and evaluation sessions.
pub fn evaluation_router<B, P>(service: Arc<EvaluationService<B, P>>) -> Router
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    Router::new()
        .route("/api/v1/evaluations/criteria", get(criteria_handler))
        .route("/api/v1/evaluations/preview", post(preview_handler))
        .route("/api/v1/evaluations/subjects", get(subjects_handler::<B, P>))
        .route(
            "/api/v1/evaluations/subjects/:group_id",
            get(subject_handler::<B, P>),
        )
        .route(
            "/api/v1/evaluations/sessions",
            post(open_session_handler::<B, P>),
        )
        .route(
            "/api/v1/evaluations/sessions/:session_id",
            get(session_handler::<B, P>).delete(cancel_handler::<B, P>),
        )
        .route(
            "/api/v1/evaluations/sessions/:session_id/period",
            put(period_handler::<B, P>),
        )
        .route(
            "/api/v1/evaluations/sessions/:session_id/metrics",
            post(reload_metrics_handler::<B, P>),
        )
        .route(
            "/api/v1/evaluations/sessions/:session_id/scores",
            put(score_handler::<B, P>),
        )
        .route(
            "/api/v1/evaluations/sessions/:session_id/auto-scoring",
            put(auto_scoring_handler::<B, P>),
        )
        .route(
            "/api/v1/evaluations/sessions/:session_id/submit",
            post(submit_handler::<B, P>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreviewRequest {
    pub metrics: MetricsPayload,
    #[serde(default)]
    pub evaluation_data: Option<EvaluationData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenSessionRequest {
    pub subject_user_id: SubjectId,
    #[serde(default)]
    pub period: EvaluationPeriod,
    #[serde(default)]
    pub auto_scoring: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    pub category: KpiCategory,
    pub section: Section,
    pub index: usize,
    pub score: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AutoScoringRequest {
    pub enabled: bool,
}

pub(crate) async fn criteria_handler() -> Response {
    (StatusCode::OK, axum::Json(catalog_view())).into_response()
}

pub(crate) async fn preview_handler(axum::Json(request): axum::Json<PreviewRequest>) -> Response {
    let metrics = request.metrics.into_snapshot();
    match score_preview(&metrics, request.evaluation_data.as_ref()) {
        Ok(preview) => (StatusCode::OK, axum::Json(preview)).into_response(),
        Err(error) => error_body(StatusCode::BAD_REQUEST, error.to_string()),
    }
}

pub(crate) async fn subjects_handler<B, P>(
    State(service): State<Arc<EvaluationService<B, P>>>,
) -> Response
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    match service.subjects().await {
        Ok(groups) => (StatusCode::OK, axum::Json(groups)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn subject_handler<B, P>(
    State(service): State<Arc<EvaluationService<B, P>>>,
    Path(group_id): Path<u64>,
) -> Response
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    match service.subject(group_id).await {
        Ok(group) => (StatusCode::OK, axum::Json(group)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn open_session_handler<B, P>(
    State(service): State<Arc<EvaluationService<B, P>>>,
    axum::Json(request): axum::Json<OpenSessionRequest>,
) -> Response
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    match service
        .open_session(request.subject_user_id, request.period, request.auto_scoring)
        .await
    {
        Ok((id, view)) => {
            let payload = json!({
                "session_id": id,
                "session": view,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn session_handler<B, P>(
    State(service): State<Arc<EvaluationService<B, P>>>,
    Path(session_id): Path<u64>,
) -> Response
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    match service.view(SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn cancel_handler<B, P>(
    State(service): State<Arc<EvaluationService<B, P>>>,
    Path(session_id): Path<u64>,
) -> Response
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    match service.cancel(SessionId(session_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn period_handler<B, P>(
    State(service): State<Arc<EvaluationService<B, P>>>,
    Path(session_id): Path<u64>,
    axum::Json(period): axum::Json<EvaluationPeriod>,
) -> Response
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    match service.change_period(SessionId(session_id), period).await {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn reload_metrics_handler<B, P>(
    State(service): State<Arc<EvaluationService<B, P>>>,
    Path(session_id): Path<u64>,
) -> Response
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    match service.reload_metrics(SessionId(session_id)).await {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn score_handler<B, P>(
    State(service): State<Arc<EvaluationService<B, P>>>,
    Path(session_id): Path<u64>,
    axum::Json(request): axum::Json<ScoreRequest>,
) -> Response
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    let criterion = match CriterionId::new(request.category, request.section, request.index) {
        Ok(criterion) => criterion,
        Err(error) => return error_body(StatusCode::BAD_REQUEST, error.to_string()),
    };

    match service.set_score(SessionId(session_id), criterion, request.score) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn auto_scoring_handler<B, P>(
    State(service): State<Arc<EvaluationService<B, P>>>,
    Path(session_id): Path<u64>,
    axum::Json(request): axum::Json<AutoScoringRequest>,
) -> Response
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    match service.set_auto_scoring(SessionId(session_id), request.enabled) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn submit_handler<B, P>(
    State(service): State<Arc<EvaluationService<B, P>>>,
    Path(session_id): Path<u64>,
) -> Response
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    match service.submit(SessionId(session_id)).await {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(error) => service_error_response(error),
    }
}

fn service_error_response(error: EvaluationServiceError) -> Response {
    match error {
        EvaluationServiceError::SessionNotFound(_) => {
            error_body(StatusCode::NOT_FOUND, error.to_string())
        }
        EvaluationServiceError::Session(SessionError::Incomplete { ref missing }) => {
            let payload = json!({
                "error": error.to_string(),
                "missing": missing,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        EvaluationServiceError::Session(SessionError::Rejected { ref errors, .. }) => {
            let payload = json!({
                "error": error.to_string(),
                "errors": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        EvaluationServiceError::Session(SessionError::InvalidScore(_))
        | EvaluationServiceError::Session(SessionError::Period(_)) => {
            error_body(StatusCode::BAD_REQUEST, error.to_string())
        }
        EvaluationServiceError::Session(SessionError::InvalidState { .. }) => {
            error_body(StatusCode::CONFLICT, error.to_string())
        }
        EvaluationServiceError::Session(SessionError::SubmissionFailed(_)) => {
            error_body(StatusCode::BAD_GATEWAY, error.to_string())
        }
        EvaluationServiceError::Backend(BackendError::NotFound) => {
            error_body(StatusCode::NOT_FOUND, error.to_string())
        }
        EvaluationServiceError::Backend(BackendError::Validation { ref errors, .. }) => {
            let payload = json!({
                "error": error.to_string(),
                "errors": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        EvaluationServiceError::Backend(_) => {
            error_body(StatusCode::BAD_GATEWAY, error.to_string())
        }
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    let payload = json!({
        "error": message,
    });
    (status, axum::Json(payload)).into_response()
}
