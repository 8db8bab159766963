use serde::Serialize;

use super::catalog::{CriterionId, KpiCategory, Section};

/// Display text explaining which operational metrics drive a criterion's automatic score.
///
/// `None` marks a manual-only criterion: the qualitative inside-the-coalition statements of
/// Communication Effectiveness and Team Objective Above Self, plus the second inside
/// criterion of Volunteer Participation.
pub fn metric_basis(criterion: &CriterionId) -> Option<&'static str> {
    use KpiCategory::*;
    use Section::*;

    let basis = match (criterion.category(), criterion.section(), criterion.index()) {
        (VolunteerParticipation, Inside, 0) => {
            "Based on: Notification response rate and login frequency"
        }
        (VolunteerParticipation, Outside, 0) => "Based on: Number of reports submitted",
        (VolunteerParticipation, Outside, 1) => "Based on: Report approval rate",
        (TaskAccommodation, Inside, 0) => "Based on: Report approval rate",
        (TaskAccommodation, Inside, 1) => {
            "Based on: Notification response rate and acceptance rate"
        }
        (TaskAccommodation, Outside, 0) => {
            "Based on: Number of reports submitted and report approval rate"
        }
        (TaskAccommodation, Outside, 1) => {
            "Based on: Number of reports submitted and report rejection rate"
        }
        (CommunicationEffectiveness, Outside, 0) => "Based on: Report approval rate",
        (CommunicationEffectiveness, Outside, 1) => {
            "Based on: Report approval rate and number of reports submitted"
        }
        (TeamObjective, Outside, 0) => "Based on: Volunteers recruited during the period",
        (TeamObjective, Outside, 1) => "Based on: Notification acceptance rate and response rate",
        _ => return None,
    };

    Some(basis)
}

/// Convenience predicate for views that only need to know whether scoring is manual.
pub fn is_manual_only(criterion: &CriterionId) -> bool {
    metric_basis(criterion).is_none()
}

/// Display-ready catalog: categories with weights, sections and metric bases.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogView {
    pub categories: Vec<CategoryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub category: KpiCategory,
    pub weight: f64,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    pub section: Section,
    pub label: &'static str,
    pub criteria: Vec<CriterionEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriterionEntry {
    pub index: usize,
    pub text: &'static str,
    pub metric_basis: Option<&'static str>,
}

pub fn catalog_view() -> CatalogView {
    let categories = KpiCategory::ALL
        .into_iter()
        .map(|category| CategoryView {
            category,
            weight: category.weight(),
            sections: Section::ALL
                .into_iter()
                .map(|section| SectionView {
                    section,
                    label: section.label(),
                    criteria: category
                        .criteria()
                        .filter(|criterion| criterion.section() == section)
                        .map(|criterion| CriterionEntry {
                            index: criterion.index(),
                            text: criterion.text(),
                            metric_basis: metric_basis(&criterion),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    CatalogView { categories }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::evaluation::catalog::criteria_text;

    fn id(category: KpiCategory, section: Section, index: usize) -> CriterionId {
        CriterionId::new(category, section, index).expect("criterion exists")
    }

    #[test]
    fn qualitative_inside_criteria_have_no_basis() {
        for category in [
            KpiCategory::CommunicationEffectiveness,
            KpiCategory::TeamObjective,
        ] {
            for criterion in category
                .criteria()
                .filter(|criterion| criterion.section() == Section::Inside)
            {
                assert!(is_manual_only(&criterion), "{criterion} should be manual");
            }
        }
        assert!(is_manual_only(&id(
            KpiCategory::VolunteerParticipation,
            Section::Inside,
            1
        )));
    }

    #[test]
    fn eleven_criteria_are_metric_driven() {
        let driven = CriterionId::all()
            .filter(|criterion| metric_basis(criterion).is_some())
            .count();
        assert_eq!(driven, 11);
    }

    #[test]
    fn catalog_view_mirrors_the_catalog() {
        let view = catalog_view();
        assert_eq!(view.categories.len(), 4);
        for category in &view.categories {
            for section in &category.sections {
                assert_eq!(
                    section.criteria.len(),
                    criteria_text(category.category, section.section).len()
                );
            }
        }
    }

    #[test]
    fn basis_text_is_display_ready() {
        assert_eq!(
            metric_basis(&id(KpiCategory::VolunteerParticipation, Section::Inside, 0)),
            Some("Based on: Notification response rate and login frequency")
        );
        for criterion in CriterionId::all() {
            if let Some(basis) = metric_basis(&criterion) {
                assert!(basis.starts_with("Based on: "));
            }
        }
    }
}
