use std::collections::BTreeMap;

use serde::Serialize;

use super::catalog::{CriterionId, KpiCategory};
use super::domain::EvaluationData;

/// Mean of the scored (non-zero) criteria of a category. Zero when nothing is scored yet.
pub fn category_score(category: KpiCategory, data: &EvaluationData) -> f64 {
    let scored: Vec<f64> = data
        .category_scores(category)
        .into_iter()
        .filter(|score| *score > 0)
        .map(f64::from)
        .collect();

    if scored.is_empty() {
        0.0
    } else {
        scored.iter().sum::<f64>() / scored.len() as f64
    }
}

/// Category averages for all four categories.
pub fn category_scores(data: &EvaluationData) -> BTreeMap<KpiCategory, f64> {
    KpiCategory::ALL
        .into_iter()
        .map(|category| (category, category_score(category, data)))
        .collect()
}

/// Weighted sum of category averages rounded to two decimals.
///
/// Incomplete categories still contribute with their full fixed weight, so a partially
/// scored evaluation reports a lower total than its scored criteria alone would suggest.
pub fn weighted_total(category_scores: &BTreeMap<KpiCategory, f64>) -> f64 {
    let sum: f64 = KpiCategory::ALL
        .iter()
        .map(|category| category_scores.get(category).copied().unwrap_or(0.0) * category.weight())
        .sum();
    round_to_hundredths(sum)
}

pub fn total_score(data: &EvaluationData) -> f64 {
    weighted_total(&category_scores(data))
}

pub fn is_category_complete(category: KpiCategory, data: &EvaluationData) -> bool {
    data.category_scores(category)
        .into_iter()
        .all(|score| score > 0)
}

/// Criteria still unscored, in catalog order. Empty means the evaluation can be submitted.
pub fn validate(data: &EvaluationData) -> Vec<CriterionId> {
    CriterionId::all()
        .filter(|criterion| data.score(criterion) == 0)
        .collect()
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-category figures shown next to the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: KpiCategory,
    pub weight: f64,
    pub average: f64,
    pub weighted: f64,
    pub scored: usize,
    pub criteria: usize,
    pub complete: bool,
}

pub fn breakdown(data: &EvaluationData) -> Vec<CategoryBreakdown> {
    KpiCategory::ALL
        .into_iter()
        .map(|category| {
            let scores = data.category_scores(category);
            let average = category_score(category, data);
            CategoryBreakdown {
                category,
                weight: category.weight(),
                average,
                weighted: round_to_hundredths(average * category.weight()),
                scored: scores.iter().filter(|score| **score > 0).count(),
                criteria: scores.len(),
                complete: is_category_complete(category, data),
            }
        })
        .collect()
}
