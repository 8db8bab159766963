use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::{CatalogError, CriterionId, KpiCategory};

/// Highest score a criterion can receive.
pub const MAX_SCORE: u8 = 4;

/// Backend user id of the associate group being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordinal rating scale. Zero is reserved for "not yet scored" and has no level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLevel {
    Poor = 1,
    Average = 2,
    Good = 3,
    Excellent = 4,
}

impl ScoreLevel {
    pub fn from_score(score: u8) -> Option<Self> {
        match score {
            1 => Some(ScoreLevel::Poor),
            2 => Some(ScoreLevel::Average),
            3 => Some(ScoreLevel::Good),
            4 => Some(ScoreLevel::Excellent),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreLevel::Poor => "Poor",
            ScoreLevel::Average => "Average",
            ScoreLevel::Good => "Good",
            ScoreLevel::Excellent => "Excellent",
        }
    }
}

/// Scores recorded for one category, keyed by slot (`inside_0`, `outside_1`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScores {
    #[serde(default)]
    pub scores: BTreeMap<String, u8>,
}

/// The `evaluation_data` document submitted to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationData(BTreeMap<KpiCategory, CategoryScores>);

impl EvaluationData {
    /// Document with a zero slot for every catalog criterion.
    pub fn blank() -> Self {
        let mut data = Self::default();
        for criterion in CriterionId::all() {
            data.set(&criterion, 0);
        }
        data
    }

    /// Score held for a criterion. Absent slots read as zero.
    pub fn score(&self, criterion: &CriterionId) -> u8 {
        self.0
            .get(&criterion.category())
            .and_then(|category| category.scores.get(&criterion.slot_key()))
            .copied()
            .unwrap_or(0)
    }

    pub fn set(&mut self, criterion: &CriterionId, score: u8) {
        self.0
            .entry(criterion.category())
            .or_default()
            .scores
            .insert(criterion.slot_key(), score);
    }

    /// Scores for every catalog slot of a category, in catalog order.
    pub fn category_scores(&self, category: KpiCategory) -> Vec<u8> {
        category
            .criteria()
            .map(|criterion| self.score(&criterion))
            .collect()
    }

    /// Rejects slot keys the catalog does not know and scores above the scale.
    pub fn check_slots(&self) -> Result<(), EvaluationDataError> {
        for (category, scores) in &self.0 {
            for (key, score) in &scores.scores {
                let criterion = CriterionId::from_slot_key(*category, key)?;
                if *score > MAX_SCORE {
                    return Err(EvaluationDataError::ScoreOutOfRange {
                        criterion,
                        score: *score,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationDataError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("score {score} for {criterion} is outside the 0-4 scale")]
    ScoreOutOfRange { criterion: CriterionId, score: u8 },
}

/// Body of `POST /api/evaluations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSubmission {
    pub user_id: SubjectId,
    pub evaluation_data: EvaluationData,
    pub total_score: f64,
}

/// Stored evaluation as returned by the backend. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(rename = "user_id", alias = "subject_user_id")]
    pub subject_user_id: SubjectId,
    pub evaluation_data: EvaluationData,
    pub total_score: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Associate group as listed by the backend directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociateGroup {
    pub id: u64,
    #[serde(default)]
    pub user_id: Option<SubjectId>,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl AssociateGroup {
    /// Groups without a linked user account cannot be evaluated.
    pub fn subject_id(&self) -> Option<SubjectId> {
        self.user_id
    }
}

/// Window of activity the metrics are computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationPeriod {
    #[default]
    Quarter,
    SixMonths,
    Year,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl EvaluationPeriod {
    pub fn label(&self) -> &'static str {
        match self {
            EvaluationPeriod::Quarter => "Last quarter",
            EvaluationPeriod::SixMonths => "Last 6 months",
            EvaluationPeriod::Year => "Last year",
            EvaluationPeriod::Custom { .. } => "Custom range",
        }
    }

    /// Resolves the period to concrete dates, rolling preset windows back from `today`.
    pub fn range(&self, today: NaiveDate) -> Result<DateRange, PeriodError> {
        let months_back = match self {
            EvaluationPeriod::Quarter => 3,
            EvaluationPeriod::SixMonths => 6,
            EvaluationPeriod::Year => 12,
            EvaluationPeriod::Custom { start, end } => {
                if start > end {
                    return Err(PeriodError::Inverted {
                        start: *start,
                        end: *end,
                    });
                }
                return Ok(DateRange {
                    start: *start,
                    end: *end,
                });
            }
        };

        let start = today
            .checked_sub_months(Months::new(months_back))
            .ok_or(PeriodError::OutOfRange(today))?;
        Ok(DateRange { start, end: today })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("custom period starts {start} after it ends {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
    #[error("period cannot be resolved relative to {0}")]
    OutOfRange(NaiveDate),
}

/// Inclusive date bounds sent as `start_date` / `end_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn query_pairs(&self) -> [(&'static str, String); 2] {
        [
            ("start_date", self.start.format("%Y-%m-%d").to_string()),
            ("end_date", self.end.format("%Y-%m-%d").to_string()),
        ]
    }
}
