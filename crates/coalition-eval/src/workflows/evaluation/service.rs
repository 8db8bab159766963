use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::backend::{
    BackendError, DashboardRefresh, EvaluationBackend, RefreshPublisher,
};
use super::catalog::CriterionId;
use super::domain::{AssociateGroup, EvaluationPeriod, EvaluationRecord, SubjectId};
use super::session::{
    EvaluationSession, MetricsOutcome, MetricsRequest, SessionError, SessionState, SessionView,
};
use crate::config::EvaluationSettings;

/// Identifier handed to the dashboard for an open evaluation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eval-{:06}", self.0)
    }
}

type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Sessions untouched for this long are dropped when the next one opens.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

struct SessionEntry {
    session: EvaluationSession,
    touched: Instant,
}

/// Service owning the open evaluation sessions and the backend they talk to.
///
/// Session state is only ever locked between awaits; backend calls run unlocked and their
/// results are re-applied through the session's generation checks. Sessions leave the map
/// when they are submitted, cancelled or left idle past the idle timeout.
pub struct EvaluationService<B, P> {
    backend: Arc<B>,
    refresh: Arc<P>,
    settings: EvaluationSettings,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    sequence: AtomicU64,
    today: Today,
    idle_timeout: Duration,
}

impl<B, P> EvaluationService<B, P>
where
    B: EvaluationBackend + 'static,
    P: RefreshPublisher + 'static,
{
    pub fn new(backend: Arc<B>, refresh: Arc<P>, settings: EvaluationSettings) -> Self {
        Self {
            backend,
            refresh,
            settings,
            sessions: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
            today: Arc::new(|| Local::now().date_naive()),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Pins the date preset periods are resolved against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Arc::new(move || today);
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn settings(&self) -> EvaluationSettings {
        self.settings
    }

    /// Opens a session for `subject` and loads metrics for the requested period.
    pub async fn open_session(
        &self,
        subject: SubjectId,
        period: EvaluationPeriod,
        auto_scoring: Option<bool>,
    ) -> Result<(SessionId, SessionView), EvaluationServiceError> {
        let mut session = EvaluationSession::new(
            subject,
            period,
            auto_scoring.unwrap_or(self.settings.auto_scoring),
            self.settings.merge_policy,
        );
        let request = session.begin_metrics_fetch((self.today)())?;

        self.evict_idle();
        let id = SessionId(self.sequence.fetch_add(1, Ordering::Relaxed));
        self.lock_sessions().insert(
            id,
            SessionEntry {
                session,
                touched: Instant::now(),
            },
        );
        info!(session = %id, %subject, period = period.label(), "evaluation session opened");

        let view = self.load_metrics(id, request).await?;
        Ok((id, view))
    }

    pub fn view(&self, id: SessionId) -> Result<SessionView, EvaluationServiceError> {
        self.with_session(id, |session| Ok(session.view()))
    }

    pub async fn change_period(
        &self,
        id: SessionId,
        period: EvaluationPeriod,
    ) -> Result<SessionView, EvaluationServiceError> {
        let today = (self.today)();
        let request = self.with_session(id, |session| {
            session
                .change_period(period, today)
                .map_err(EvaluationServiceError::from)
        })?;
        self.load_metrics(id, request).await
    }

    /// Re-fetches metrics for the current period.
    pub async fn reload_metrics(
        &self,
        id: SessionId,
    ) -> Result<SessionView, EvaluationServiceError> {
        let today = (self.today)();
        let request = self.with_session(id, |session| {
            session
                .begin_metrics_fetch(today)
                .map_err(EvaluationServiceError::from)
        })?;
        self.load_metrics(id, request).await
    }

    async fn load_metrics(
        &self,
        id: SessionId,
        request: MetricsRequest,
    ) -> Result<SessionView, EvaluationServiceError> {
        let result = self
            .backend
            .performance_metrics(request.subject, request.range)
            .await;
        if let Err(err) = &result {
            warn!(
                session = %id,
                error = %err,
                "performance metrics unavailable, falling back to manual scoring"
            );
        }

        self.with_session(id, |session| {
            match session.complete_metrics_fetch(request.generation, result) {
                MetricsOutcome::Stale => {
                    debug!(
                        session = %id,
                        generation = request.generation,
                        "discarded stale metrics response"
                    )
                }
                MetricsOutcome::Applied => {
                    debug!(session = %id, generation = request.generation, "metrics applied")
                }
                MetricsOutcome::ManualOnly => {}
            }
            Ok(session.view())
        })
    }

    pub fn set_score(
        &self,
        id: SessionId,
        criterion: CriterionId,
        score: u8,
    ) -> Result<SessionView, EvaluationServiceError> {
        self.with_session(id, |session| {
            session.set_score(criterion, score)?;
            Ok(session.view())
        })
    }

    pub fn set_auto_scoring(
        &self,
        id: SessionId,
        enabled: bool,
    ) -> Result<SessionView, EvaluationServiceError> {
        self.with_session(id, |session| {
            session.set_auto_scoring(enabled)?;
            Ok(session.view())
        })
    }

    /// Validates and submits the session. Incomplete evaluations are rejected before any
    /// request reaches the backend.
    pub async fn submit(&self, id: SessionId) -> Result<EvaluationRecord, EvaluationServiceError> {
        let submission =
            self.with_session(id, |session| session.begin_submit().map_err(Into::into))?;

        let result = self.backend.submit_evaluation(&submission).await;
        if let Err(err) = &result {
            warn!(session = %id, error = %err, "evaluation submission failed");
        }

        let record = {
            let mut sessions = self.lock_sessions();
            let entry = sessions
                .get_mut(&id)
                .ok_or(EvaluationServiceError::SessionNotFound(id))?;
            let record = entry.session.complete_submit(result)?;
            sessions.remove(&id);
            record
        };

        info!(
            session = %id,
            subject = %record.subject_user_id,
            total_score = record.total_score,
            "evaluation submitted"
        );

        let event = DashboardRefresh {
            subject_user_id: record.subject_user_id,
            evaluation_id: record.id,
            total_score: record.total_score,
            emitted_at: Utc::now(),
        };
        if let Err(err) = self.refresh.publish(event) {
            warn!(session = %id, error = %err, "dashboard refresh not delivered");
        }

        Ok(record)
    }

    /// Drops the session and every unsaved edit. Refused while a submission is in flight.
    pub fn cancel(&self, id: SessionId) -> Result<(), EvaluationServiceError> {
        let mut sessions = self.lock_sessions();
        let entry = sessions
            .get(&id)
            .ok_or(EvaluationServiceError::SessionNotFound(id))?;
        entry.session.check_cancellable()?;
        sessions.remove(&id);
        info!(session = %id, "evaluation session closed");
        Ok(())
    }

    /// Number of sessions currently held.
    pub fn open_sessions(&self) -> usize {
        self.lock_sessions().len()
    }

    fn evict_idle(&self) {
        let idle_timeout = self.idle_timeout;
        self.lock_sessions().retain(|id, entry| {
            let keep = entry.session.state() == SessionState::Submitting
                || entry.touched.elapsed() < idle_timeout;
            if !keep {
                debug!(session = %id, "evicted idle evaluation session");
            }
            keep
        });
    }

    pub async fn subjects(&self) -> Result<Vec<AssociateGroup>, EvaluationServiceError> {
        Ok(self.backend.associate_groups().await?)
    }

    pub async fn subject(&self, group_id: u64) -> Result<AssociateGroup, EvaluationServiceError> {
        Ok(self.backend.associate_group(group_id).await?)
    }

    fn with_session<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut EvaluationSession) -> Result<T, EvaluationServiceError>,
    ) -> Result<T, EvaluationServiceError> {
        let mut sessions = self.lock_sessions();
        let entry = sessions
            .get_mut(&id)
            .ok_or(EvaluationServiceError::SessionNotFound(id))?;
        entry.touched = Instant::now();
        f(&mut entry.session)
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.sessions.lock().expect("session mutex poisoned")
    }
}

/// Error raised by the evaluation service.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationServiceError {
    #[error("evaluation session {0} not found")]
    SessionNotFound(SessionId),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}
