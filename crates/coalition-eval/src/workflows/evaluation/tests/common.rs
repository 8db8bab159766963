use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::config::EvaluationSettings;
use crate::workflows::evaluation::{
    evaluation_router, AssociateGroup, BackendError, CriterionId, DashboardRefresh, DateRange,
    EvaluationBackend, EvaluationPeriod, EvaluationRecord, EvaluationService, EvaluationSession,
    EvaluationSubmission, KpiCategory, MergePolicy, MetricsSnapshot, NotifyError,
    RefreshPublisher, Section, SubjectId,
};

pub(super) const SUBJECT: SubjectId = SubjectId(42);

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date")
}

pub(super) fn criterion(category: KpiCategory, section: Section, index: usize) -> CriterionId {
    CriterionId::new(category, section, index).expect("criterion exists")
}

/// Metrics from the dashboard walkthrough: a busy group with strong approval.
pub(super) fn scenario_metrics() -> MetricsSnapshot {
    serde_json::from_value(json!({
        "reports": { "approval_rate": 92, "total_submitted": 12 },
        "notifications": { "response_rate": 91, "acceptance_rate": 80 },
        "system_engagement": { "login_frequency_per_week": 5 },
        "volunteers": { "recruited_in_period": 11 }
    }))
    .expect("scenario metrics decode")
}

/// Metrics that put every metric-driven criterion in the top band.
pub(super) fn strong_metrics() -> MetricsSnapshot {
    serde_json::from_value(json!({
        "reports": { "approval_rate": 95, "total_submitted": 12, "approved": 11, "rejected": 0 },
        "notifications": { "response_rate": 95, "acceptance_rate": 90 },
        "system_engagement": { "login_frequency_per_week": 5 },
        "volunteers": { "recruited_in_period": 11 }
    }))
    .expect("strong metrics decode")
}

/// Metrics that put every metric-driven criterion in the second band.
pub(super) fn moderate_metrics() -> MetricsSnapshot {
    serde_json::from_value(json!({
        "reports": { "approval_rate": 80, "total_submitted": 8, "approved": 6, "rejected": 1 },
        "notifications": { "response_rate": 80, "acceptance_rate": 70 },
        "system_engagement": { "login_frequency_per_week": 3 },
        "volunteers": { "recruited_in_period": 6 }
    }))
    .expect("moderate metrics decode")
}

pub(super) fn manual_only_criteria() -> Vec<CriterionId> {
    CriterionId::all()
        .filter(crate::workflows::evaluation::is_manual_only)
        .collect()
}

/// Session that has loaded `metrics` and is ready for editing.
pub(super) fn loaded_session(metrics: MetricsSnapshot, policy: MergePolicy) -> EvaluationSession {
    let mut session = EvaluationSession::new(SUBJECT, EvaluationPeriod::Quarter, true, policy);
    let request = session
        .begin_metrics_fetch(today())
        .expect("fetch can start");
    session.complete_metrics_fetch(request.generation, Ok(metrics));
    session
}

pub(super) fn fill_manual_criteria(session: &mut EvaluationSession, score: u8) {
    for criterion in manual_only_criteria() {
        session
            .set_score(criterion, score)
            .expect("manual score accepted");
    }
}

pub(super) fn settings() -> EvaluationSettings {
    EvaluationSettings {
        auto_scoring: true,
        merge_policy: MergePolicy::PreserveManual,
    }
}

pub(super) fn build_service() -> (
    EvaluationService<MemoryBackend, MemoryRefresh>,
    Arc<MemoryBackend>,
    Arc<MemoryRefresh>,
) {
    build_service_with(MemoryBackend::with_metrics(strong_metrics()))
}

pub(super) fn build_service_with(
    backend: MemoryBackend,
) -> (
    EvaluationService<MemoryBackend, MemoryRefresh>,
    Arc<MemoryBackend>,
    Arc<MemoryRefresh>,
) {
    let backend = Arc::new(backend);
    let refresh = Arc::new(MemoryRefresh::default());
    let service = EvaluationService::new(backend.clone(), refresh.clone(), settings())
        .with_today(today());
    (service, backend, refresh)
}

pub(super) fn router_with_service(
    service: EvaluationService<MemoryBackend, MemoryRefresh>,
) -> axum::Router {
    evaluation_router(Arc::new(service))
}

/// Backend double that records every call instead of touching the network.
pub(super) struct MemoryBackend {
    metrics: Mutex<Result<MetricsSnapshot, BackendError>>,
    submit_failure: Mutex<Option<BackendError>>,
    submit_gate: Mutex<Option<Arc<Notify>>>,
    groups: Vec<AssociateGroup>,
    metrics_calls: AtomicUsize,
    ranges: Mutex<Vec<DateRange>>,
    submissions: Mutex<Vec<EvaluationSubmission>>,
}

impl MemoryBackend {
    pub(super) fn with_metrics(metrics: MetricsSnapshot) -> Self {
        Self::from_result(Ok(metrics))
    }

    pub(super) fn failing_metrics(error: BackendError) -> Self {
        Self::from_result(Err(error))
    }

    fn from_result(metrics: Result<MetricsSnapshot, BackendError>) -> Self {
        Self {
            metrics: Mutex::new(metrics),
            submit_failure: Mutex::new(None),
            submit_gate: Mutex::new(None),
            groups: vec![
                AssociateGroup {
                    id: 1,
                    user_id: Some(SUBJECT),
                    name: "Bayanihan Responders".to_string(),
                    status: Some("active".to_string()),
                    email: Some("responders@coalition.test".to_string()),
                },
                AssociateGroup {
                    id: 2,
                    user_id: None,
                    name: "Pending Chapter".to_string(),
                    status: Some("pending".to_string()),
                    email: None,
                },
            ],
            metrics_calls: AtomicUsize::new(0),
            ranges: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn set_metrics(&self, metrics: Result<MetricsSnapshot, BackendError>) {
        *self.metrics.lock().expect("metrics mutex poisoned") = metrics;
    }

    pub(super) fn fail_submissions(&self, error: BackendError) {
        *self.submit_failure.lock().expect("submit mutex poisoned") = Some(error);
    }

    /// Makes submissions wait until the returned handle is notified.
    pub(super) fn hold_submissions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.submit_gate.lock().expect("gate mutex poisoned") = Some(gate.clone());
        gate
    }

    pub(super) fn metrics_calls(&self) -> usize {
        self.metrics_calls.load(Ordering::SeqCst)
    }

    pub(super) fn ranges(&self) -> Vec<DateRange> {
        self.ranges.lock().expect("range mutex poisoned").clone()
    }

    pub(super) fn submissions(&self) -> Vec<EvaluationSubmission> {
        self.submissions
            .lock()
            .expect("submission mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl EvaluationBackend for MemoryBackend {
    async fn performance_metrics(
        &self,
        _subject: SubjectId,
        range: DateRange,
    ) -> Result<MetricsSnapshot, BackendError> {
        self.metrics_calls.fetch_add(1, Ordering::SeqCst);
        self.ranges.lock().expect("range mutex poisoned").push(range);
        self.metrics.lock().expect("metrics mutex poisoned").clone()
    }

    async fn submit_evaluation(
        &self,
        submission: &EvaluationSubmission,
    ) -> Result<EvaluationRecord, BackendError> {
        let gate = self.submit_gate.lock().expect("gate mutex poisoned").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.submissions
            .lock()
            .expect("submission mutex poisoned")
            .push(submission.clone());
        if let Some(error) = self.submit_failure.lock().expect("submit mutex poisoned").clone() {
            return Err(error);
        }

        let id = self.submissions().len() as u64;
        Ok(EvaluationRecord {
            id: Some(id),
            subject_user_id: submission.user_id,
            evaluation_data: submission.evaluation_data.clone(),
            total_score: submission.total_score,
            created_at: None,
        })
    }

    async fn associate_groups(&self) -> Result<Vec<AssociateGroup>, BackendError> {
        Ok(self.groups.clone())
    }

    async fn associate_group(&self, id: u64) -> Result<AssociateGroup, BackendError> {
        self.groups
            .iter()
            .find(|group| group.id == id)
            .cloned()
            .ok_or(BackendError::NotFound)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRefresh {
    events: Arc<Mutex<Vec<DashboardRefresh>>>,
}

impl MemoryRefresh {
    pub(super) fn events(&self) -> Vec<DashboardRefresh> {
        self.events.lock().expect("refresh mutex poisoned").clone()
    }
}

impl RefreshPublisher for MemoryRefresh {
    fn publish(&self, event: DashboardRefresh) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("refresh mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
