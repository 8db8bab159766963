use serde::Serialize;

use super::aggregate::{self, CategoryBreakdown};
use super::catalog::{CriterionId, KpiCategory, Section};
use super::descriptor::metric_basis;
use super::domain::{EvaluationData, EvaluationDataError, ScoreLevel};
use super::metrics::MetricsSnapshot;
use super::rules::auto_score;

/// Scoring result for a metrics snapshot without opening a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorePreview {
    pub criteria: Vec<PreviewRow>,
    pub evaluation_data: EvaluationData,
    pub categories: Vec<CategoryBreakdown>,
    pub total_score: f64,
    pub missing: Vec<CriterionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRow {
    pub category: KpiCategory,
    pub section: Section,
    pub index: usize,
    pub text: &'static str,
    pub metric_basis: Option<&'static str>,
    pub auto_score: u8,
    pub score: u8,
    pub level: Option<ScoreLevel>,
}

/// Auto-scores `metrics`, then lays non-zero `overrides` on top.
pub fn score_preview(
    metrics: &MetricsSnapshot,
    overrides: Option<&EvaluationData>,
) -> Result<ScorePreview, EvaluationDataError> {
    if let Some(overrides) = overrides {
        overrides.check_slots()?;
    }

    let mut data = EvaluationData::blank();
    let mut criteria = Vec::new();
    for criterion in CriterionId::all() {
        let auto = auto_score(&criterion, metrics);
        let manual = overrides.map(|data| data.score(&criterion)).unwrap_or(0);
        let score = if manual > 0 { manual } else { auto };
        data.set(&criterion, score);
        criteria.push(PreviewRow {
            category: criterion.category(),
            section: criterion.section(),
            index: criterion.index(),
            text: criterion.text(),
            metric_basis: metric_basis(&criterion),
            auto_score: auto,
            score,
            level: ScoreLevel::from_score(score),
        });
    }

    Ok(ScorePreview {
        criteria,
        categories: aggregate::breakdown(&data),
        total_score: aggregate::total_score(&data),
        missing: aggregate::validate(&data),
        evaluation_data: data,
    })
}
