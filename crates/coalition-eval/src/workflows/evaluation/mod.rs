//! Performance evaluation of coalition associate groups.
//!
//! A fixed catalog of criteria is scored 1-4, seeded from backend activity metrics where a
//! rule exists and rated by hand otherwise. Category averages are combined into a weighted
//! total and submitted as a single immutable evaluation record.

pub mod aggregate;
pub mod backend;
pub mod catalog;
pub mod descriptor;
pub mod domain;
pub mod http;
pub mod metrics;
pub mod preview;
pub mod router;
pub(crate) mod rules;
pub mod service;
pub mod session;

#[cfg(test)]
mod tests;

pub use aggregate::{
    breakdown, category_score, category_scores, is_category_complete, total_score, validate,
    weighted_total, CategoryBreakdown,
};
pub use backend::{
    BackendError, BroadcastRefresh, DashboardRefresh, EvaluationBackend, NotifyError,
    RefreshPublisher,
};
pub use catalog::{verify_weights, CatalogError, CriterionId, KpiCategory, Section};
pub use descriptor::{catalog_view, is_manual_only, metric_basis, CatalogView};
pub use domain::{
    AssociateGroup, CategoryScores, DateRange, EvaluationData, EvaluationDataError,
    EvaluationPeriod, EvaluationRecord, EvaluationSubmission, PeriodError, ScoreLevel, SubjectId,
    MAX_SCORE,
};
pub use http::HttpEvaluationBackend;
pub use metrics::{
    EngagementMetrics, MetricsPayload, MetricsSnapshot, NotificationMetrics, ReportMetrics,
    VolunteerMetrics,
};
pub use preview::{score_preview, PreviewRow, ScorePreview};
pub use router::evaluation_router;
pub use rules::{auto_score, auto_scores};
pub use service::{EvaluationService, EvaluationServiceError, SessionId, DEFAULT_IDLE_TIMEOUT};
pub use session::{
    CriterionView, EvaluationSession, MergePolicy, MetricsOutcome, MetricsRequest, ScoreSource,
    SessionError, SessionState, SessionView,
};
