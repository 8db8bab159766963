use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::aggregate::{self, CategoryBreakdown};
use super::backend::BackendError;
use super::catalog::{CriterionId, KpiCategory, Section};
use super::descriptor::metric_basis;
use super::domain::{
    DateRange, EvaluationData, EvaluationPeriod, EvaluationRecord, EvaluationSubmission,
    PeriodError, ScoreLevel, SubjectId, MAX_SCORE,
};
use super::metrics::MetricsSnapshot;
use super::rules::auto_score;

/// How many unscored criteria an incomplete-submission message names.
const MISSING_PREVIEW: usize = 3;
/// How many backend field errors a rejected submission surfaces.
const FIELD_ERROR_PREVIEW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    MetricsLoading,
    Ready,
    Editing,
    Submitting,
    Submitted,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::MetricsLoading => "metrics_loading",
            SessionState::Ready => "ready",
            SessionState::Editing => "editing",
            SessionState::Submitting => "submitting",
            SessionState::Submitted => "submitted",
        }
    }

    fn is_locked(self) -> bool {
        matches!(self, SessionState::Submitting | SessionState::Submitted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What happens to existing scores when fresh auto scores arrive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Only fill slots that were not rated by hand.
    #[default]
    PreserveManual,
    /// Every metric-driven slot takes the new auto score.
    AlwaysOverwrite,
}

impl MergePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "preserve-manual" | "preserve" => Some(MergePolicy::PreserveManual),
            "overwrite" | "always-overwrite" => Some(MergePolicy::AlwaysOverwrite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Unscored,
    Auto,
    Manual,
}

/// A metrics fetch the caller must perform and hand back with its generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsRequest {
    pub generation: u64,
    pub subject: SubjectId,
    pub range: DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsOutcome {
    Applied,
    /// The fetch failed; the session continues with manual scoring only.
    ManualOnly,
    /// A newer fetch was started after this one; the response was dropped.
    Stale,
}

/// In-memory evaluation of a single subject. Nothing is persisted until submission.
#[derive(Debug, Clone)]
pub struct EvaluationSession {
    subject: SubjectId,
    period: EvaluationPeriod,
    range: Option<DateRange>,
    state: SessionState,
    auto_scoring: bool,
    merge_policy: MergePolicy,
    generation: u64,
    metrics: Option<MetricsSnapshot>,
    metrics_warning: Option<String>,
    data: EvaluationData,
    auto: BTreeMap<CriterionId, u8>,
    manual: BTreeSet<CriterionId>,
    last_error: Option<String>,
    record: Option<EvaluationRecord>,
}

impl EvaluationSession {
    pub fn new(
        subject: SubjectId,
        period: EvaluationPeriod,
        auto_scoring: bool,
        merge_policy: MergePolicy,
    ) -> Self {
        Self {
            subject,
            period,
            range: None,
            state: SessionState::Idle,
            auto_scoring,
            merge_policy,
            generation: 0,
            metrics: None,
            metrics_warning: None,
            data: EvaluationData::blank(),
            auto: BTreeMap::new(),
            manual: BTreeSet::new(),
            last_error: None,
            record: None,
        }
    }

    pub fn subject(&self) -> SubjectId {
        self.subject
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn period(&self) -> EvaluationPeriod {
        self.period
    }

    pub fn auto_scoring(&self) -> bool {
        self.auto_scoring
    }

    pub fn metrics(&self) -> Option<&MetricsSnapshot> {
        self.metrics.as_ref()
    }

    pub fn metrics_warning(&self) -> Option<&str> {
        self.metrics_warning.as_deref()
    }

    pub fn evaluation_data(&self) -> &EvaluationData {
        &self.data
    }

    pub fn score(&self, criterion: &CriterionId) -> u8 {
        self.data.score(criterion)
    }

    pub fn record(&self) -> Option<&EvaluationRecord> {
        self.record.as_ref()
    }

    pub fn total_score(&self) -> f64 {
        aggregate::total_score(&self.data)
    }

    pub fn source(&self, criterion: &CriterionId) -> ScoreSource {
        if self.data.score(criterion) == 0 {
            ScoreSource::Unscored
        } else if self.manual.contains(criterion) {
            ScoreSource::Manual
        } else {
            ScoreSource::Auto
        }
    }

    /// Starts a metrics fetch for the current period. Any fetch still in flight becomes stale.
    pub fn begin_metrics_fetch(
        &mut self,
        today: NaiveDate,
    ) -> Result<MetricsRequest, SessionError> {
        self.ensure_unlocked("load metrics")?;
        let range = self.period.range(today)?;
        Ok(self.start_fetch(range))
    }

    /// Switches the evaluation window and starts a fetch for it.
    pub fn change_period(
        &mut self,
        period: EvaluationPeriod,
        today: NaiveDate,
    ) -> Result<MetricsRequest, SessionError> {
        self.ensure_unlocked("change the period")?;
        let range = period.range(today)?;
        self.period = period;
        Ok(self.start_fetch(range))
    }

    fn start_fetch(&mut self, range: DateRange) -> MetricsRequest {
        self.generation += 1;
        self.range = Some(range);
        self.state = SessionState::MetricsLoading;
        MetricsRequest {
            generation: self.generation,
            subject: self.subject,
            range,
        }
    }

    /// Applies the result of the fetch identified by `generation`.
    pub fn complete_metrics_fetch(
        &mut self,
        generation: u64,
        result: Result<MetricsSnapshot, BackendError>,
    ) -> MetricsOutcome {
        if generation != self.generation || self.state.is_locked() {
            return MetricsOutcome::Stale;
        }

        let outcome = match result {
            Ok(metrics) => {
                self.auto = CriterionId::all()
                    .map(|criterion| (criterion, auto_score(&criterion, &metrics)))
                    .collect();
                self.metrics = Some(metrics);
                self.metrics_warning = None;
                if self.auto_scoring {
                    self.apply_auto_scores();
                }
                MetricsOutcome::Applied
            }
            Err(err) => {
                // Scores derived from an earlier window do not carry over.
                for criterion in CriterionId::all() {
                    if !self.manual.contains(&criterion) {
                        self.data.set(&criterion, 0);
                    }
                }
                self.metrics = None;
                self.auto.clear();
                self.metrics_warning = Some(format!(
                    "Performance metrics are unavailable ({err}); score every criterion manually."
                ));
                MetricsOutcome::ManualOnly
            }
        };

        if self.state == SessionState::MetricsLoading {
            self.state = SessionState::Ready;
        }
        outcome
    }

    /// Enables or disables automatic scoring. Enabling reapplies the latest auto scores;
    /// disabling leaves every current score untouched.
    pub fn set_auto_scoring(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.ensure_unlocked("toggle automatic scoring")?;
        let was_enabled = self.auto_scoring;
        self.auto_scoring = enabled;
        if enabled && !was_enabled {
            self.apply_auto_scores();
        }
        Ok(())
    }

    /// Writes the latest auto scores into the evaluation. Manually rated slots are kept
    /// under [`MergePolicy::PreserveManual`].
    fn apply_auto_scores(&mut self) {
        let fresh: Vec<(CriterionId, u8)> = self
            .auto
            .iter()
            .filter(|(_, score)| **score > 0)
            .map(|(criterion, score)| (*criterion, *score))
            .collect();

        for (criterion, score) in fresh {
            let replace = match self.merge_policy {
                MergePolicy::AlwaysOverwrite => true,
                MergePolicy::PreserveManual => !self.manual.contains(&criterion),
            };
            if replace {
                self.data.set(&criterion, score);
                self.manual.remove(&criterion);
            }
        }
    }

    /// Records a manual 1-4 rating for a criterion.
    pub fn set_score(&mut self, criterion: CriterionId, score: u8) -> Result<(), SessionError> {
        self.ensure_unlocked("edit scores")?;
        if score == 0 || score > MAX_SCORE {
            return Err(SessionError::InvalidScore(score));
        }

        self.data.set(&criterion, score);
        self.manual.insert(criterion);
        self.last_error = None;
        if self.state != SessionState::MetricsLoading {
            self.state = SessionState::Editing;
        }
        Ok(())
    }

    /// Validates the scores and, when complete, moves to `Submitting` and returns the body to
    /// send. Incomplete evaluations never leave the session.
    pub fn begin_submit(&mut self) -> Result<EvaluationSubmission, SessionError> {
        if !matches!(self.state, SessionState::Ready | SessionState::Editing) {
            return Err(SessionError::InvalidState {
                action: "submit",
                state: self.state,
            });
        }

        let missing = aggregate::validate(&self.data);
        if !missing.is_empty() {
            let err = SessionError::Incomplete { missing };
            self.state = SessionState::Editing;
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        self.state = SessionState::Submitting;
        self.last_error = None;
        Ok(EvaluationSubmission {
            user_id: self.subject,
            evaluation_data: self.data.clone(),
            total_score: self.total_score(),
        })
    }

    pub fn complete_submit(
        &mut self,
        result: Result<EvaluationRecord, BackendError>,
    ) -> Result<EvaluationRecord, SessionError> {
        if self.state != SessionState::Submitting {
            return Err(SessionError::InvalidState {
                action: "finish submitting",
                state: self.state,
            });
        }

        match result {
            Ok(record) => {
                self.state = SessionState::Submitted;
                self.record = Some(record.clone());
                Ok(record)
            }
            Err(err) => {
                self.state = SessionState::Editing;
                let err = match err {
                    BackendError::Validation {
                        message,
                        mut errors,
                    } => {
                        errors.truncate(FIELD_ERROR_PREVIEW);
                        SessionError::Rejected { message, errors }
                    }
                    other => SessionError::SubmissionFailed(other.to_string()),
                };
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// A session can be discarded at any point except while its submission is in flight.
    pub fn check_cancellable(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Submitting {
            Err(SessionError::InvalidState {
                action: "cancel",
                state: self.state,
            })
        } else {
            Ok(())
        }
    }

    fn ensure_unlocked(&self, action: &'static str) -> Result<(), SessionError> {
        if self.state.is_locked() {
            Err(SessionError::InvalidState {
                action,
                state: self.state,
            })
        } else {
            Ok(())
        }
    }

    pub fn view(&self) -> SessionView {
        let criteria = CriterionId::all()
            .map(|criterion| {
                let score = self.data.score(&criterion);
                CriterionView {
                    category: criterion.category(),
                    section: criterion.section(),
                    section_label: criterion.section().label(),
                    index: criterion.index(),
                    text: criterion.text(),
                    metric_basis: metric_basis(&criterion),
                    score,
                    level: ScoreLevel::from_score(score),
                    auto_score: self.auto.get(&criterion).copied().filter(|auto| *auto > 0),
                    source: self.source(&criterion),
                }
            })
            .collect();

        SessionView {
            subject_user_id: self.subject,
            state: self.state,
            period: self.period,
            range: self.range,
            auto_scoring: self.auto_scoring,
            merge_policy: self.merge_policy,
            metrics: self.metrics.clone(),
            metrics_warning: self.metrics_warning.clone(),
            criteria,
            categories: aggregate::breakdown(&self.data),
            total_score: self.total_score(),
            missing: aggregate::validate(&self.data).len(),
            last_error: self.last_error.clone(),
            record: self.record.clone(),
        }
    }
}

/// Serializable snapshot of a session for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub subject_user_id: SubjectId,
    pub state: SessionState,
    pub period: EvaluationPeriod,
    pub range: Option<DateRange>,
    pub auto_scoring: bool,
    pub merge_policy: MergePolicy,
    pub metrics: Option<MetricsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_warning: Option<String>,
    pub criteria: Vec<CriterionView>,
    pub categories: Vec<CategoryBreakdown>,
    pub total_score: f64,
    pub missing: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<EvaluationRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriterionView {
    pub category: KpiCategory,
    pub section: Section,
    pub section_label: &'static str,
    pub index: usize,
    pub text: &'static str,
    pub metric_basis: Option<&'static str>,
    pub score: u8,
    pub level: Option<ScoreLevel>,
    pub auto_score: Option<u8>,
    pub source: ScoreSource,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("score {0} is outside the 1-4 scale")]
    InvalidScore(u8),
    #[error("cannot {action} while the session is {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error("{}", incomplete_message(.missing))]
    Incomplete { missing: Vec<CriterionId> },
    #[error("{}", rejected_message(.message, .errors))]
    Rejected {
        message: String,
        errors: Vec<String>,
    },
    #[error("failed to submit the evaluation, please try again")]
    SubmissionFailed(String),
}

fn incomplete_message(missing: &[CriterionId]) -> String {
    let named: Vec<String> = missing
        .iter()
        .take(MISSING_PREVIEW)
        .map(|criterion| format!("\"{}\"", criterion.text()))
        .collect();
    let mut message = format!(
        "please score all criteria before submitting; missing: {}",
        named.join(", ")
    );
    if missing.len() > MISSING_PREVIEW {
        message.push_str(&format!(" and {} more", missing.len() - MISSING_PREVIEW));
    }
    message
}

fn rejected_message(message: &str, errors: &[String]) -> String {
    if errors.is_empty() {
        message.to_string()
    } else {
        format!("{message}: {}", errors.join("; "))
    }
}
