use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::domain::{
    AssociateGroup, DateRange, EvaluationRecord, EvaluationSubmission, SubjectId,
};
use super::metrics::MetricsSnapshot;

/// Coalition REST backend operations the evaluation workflow depends on.
#[async_trait]
pub trait EvaluationBackend: Send + Sync {
    async fn performance_metrics(
        &self,
        subject: SubjectId,
        range: DateRange,
    ) -> Result<MetricsSnapshot, BackendError>;

    async fn submit_evaluation(
        &self,
        submission: &EvaluationSubmission,
    ) -> Result<EvaluationRecord, BackendError>;

    async fn associate_groups(&self) -> Result<Vec<AssociateGroup>, BackendError>;

    async fn associate_group(&self, id: u64) -> Result<AssociateGroup, BackendError>;
}

/// Failure talking to the backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("backend rejected the request: {message}")]
    Validation {
        message: String,
        errors: Vec<String>,
    },
    #[error("backend resource not found")]
    NotFound,
    #[error("backend responded with status {status}")]
    Status { status: u16 },
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("unexpected backend payload: {0}")]
    Decode(String),
}

/// Signal sent to the dashboard after an evaluation is stored so it reloads its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardRefresh {
    pub subject_user_id: SubjectId,
    pub evaluation_id: Option<u64>,
    pub total_score: f64,
    pub emitted_at: DateTime<Utc>,
}

/// Outbound hook replacing the global "refresh now" flag of the dashboard.
pub trait RefreshPublisher: Send + Sync {
    fn publish(&self, event: DashboardRefresh) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("refresh channel unavailable: {0}")]
    Channel(String),
}

/// Broadcast channel scoped to the lifetime of the service that owns it.
#[derive(Debug, Clone)]
pub struct BroadcastRefresh {
    sender: broadcast::Sender<DashboardRefresh>,
}

impl BroadcastRefresh {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardRefresh> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastRefresh {
    fn default() -> Self {
        Self::new(16)
    }
}

impl RefreshPublisher for BroadcastRefresh {
    fn publish(&self, event: DashboardRefresh) -> Result<(), NotifyError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|_| NotifyError::Channel("no dashboard is subscribed".to_string()))
    }
}
