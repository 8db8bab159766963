use super::common::*;
use serde_json::json;

use crate::workflows::evaluation::{
    auto_score, auto_scores, metric_basis, score_preview, total_score, validate, CriterionId,
    EvaluationData, EvaluationDataError, KpiCategory, MetricsSnapshot, Section,
};

#[test]
fn walkthrough_metrics_score_top_band() {
    let metrics = scenario_metrics();

    for (category, section, index) in [
        (KpiCategory::VolunteerParticipation, Section::Inside, 0),
        (KpiCategory::VolunteerParticipation, Section::Outside, 0),
        (KpiCategory::VolunteerParticipation, Section::Outside, 1),
        (KpiCategory::TeamObjective, Section::Outside, 0),
    ] {
        let id = criterion(category, section, index);
        assert_eq!(auto_score(&id, &metrics), 4, "{id}");
    }
}

#[test]
fn empty_metrics_put_metric_criteria_in_lowest_band() {
    let metrics = MetricsSnapshot::default();

    for (id, score) in auto_scores(&metrics) {
        if metric_basis(&id).is_some() {
            assert_eq!(score, 1, "{id}");
        } else {
            assert_eq!(score, 0, "{id}");
        }
    }
}

#[test]
fn manual_only_criteria_never_auto_score() {
    for metrics in [strong_metrics(), moderate_metrics(), MetricsSnapshot::default()] {
        for id in manual_only_criteria() {
            assert_eq!(auto_score(&id, &metrics), 0, "{id}");
        }
    }
    assert_eq!(manual_only_criteria().len(), 7);
}

#[test]
fn band_fixtures_land_where_expected() {
    for (id, score) in auto_scores(&strong_metrics()) {
        if metric_basis(&id).is_some() {
            assert_eq!(score, 4, "{id}");
        }
    }
    for (id, score) in auto_scores(&moderate_metrics()) {
        if metric_basis(&id).is_some() {
            assert_eq!(score, 3, "{id}");
        }
    }
}

type Driver = fn(&mut MetricsSnapshot, f64);

fn driver(id: CriterionId, drive: Driver) -> (CriterionId, Driver) {
    (id, drive)
}

/// Each metric-driven criterion with a setter that raises its driving quantities together.
/// `level` runs from 0 to 100; at 100 every quantity sits past its top band.
fn metric_drivers() -> Vec<(CriterionId, Driver)> {
    use KpiCategory::*;
    use Section::*;

    vec![
        driver(criterion(VolunteerParticipation, Inside, 0), |m, level| {
            m.notifications.response_rate = level;
            m.system_engagement.login_frequency_per_week = level / 20.0;
        }),
        driver(criterion(VolunteerParticipation, Outside, 0), |m, level| {
            m.reports.total_submitted = level / 5.0;
        }),
        driver(criterion(VolunteerParticipation, Outside, 1), |m, level| {
            m.reports.approval_rate = level;
        }),
        driver(criterion(TaskAccommodation, Inside, 0), |m, level| {
            m.reports.approval_rate = level;
        }),
        driver(criterion(TaskAccommodation, Inside, 1), |m, level| {
            m.notifications.response_rate = level;
            m.notifications.acceptance_rate = level;
        }),
        driver(criterion(TaskAccommodation, Outside, 0), |m, level| {
            m.reports.total_submitted = level / 5.0;
            m.reports.approval_rate = level;
        }),
        driver(criterion(TaskAccommodation, Outside, 1), |m, level| {
            m.reports.total_submitted = level / 5.0;
        }),
        driver(criterion(CommunicationEffectiveness, Outside, 0), |m, level| {
            m.reports.approval_rate = level;
        }),
        driver(criterion(CommunicationEffectiveness, Outside, 1), |m, level| {
            m.reports.approval_rate = level;
            m.reports.total_submitted = level / 5.0;
        }),
        driver(criterion(TeamObjective, Outside, 0), |m, level| {
            m.volunteers.recruited_in_period = level / 5.0;
        }),
        driver(criterion(TeamObjective, Outside, 1), |m, level| {
            m.notifications.acceptance_rate = level;
            m.notifications.response_rate = level;
        }),
    ]
}

#[test]
fn every_metric_criterion_has_a_driver() {
    let driven: Vec<CriterionId> = metric_drivers().into_iter().map(|(id, _)| id).collect();
    let expected: Vec<CriterionId> = CriterionId::all()
        .filter(|id| metric_basis(id).is_some())
        .collect();
    assert_eq!(driven, expected);
}

#[test]
fn scores_never_drop_as_driving_quantities_rise() {
    for (id, drive) in metric_drivers() {
        let mut previous = 0;
        for level in 0..=100 {
            let mut metrics = MetricsSnapshot::default();
            drive(&mut metrics, f64::from(level));
            let score = auto_score(&id, &metrics);
            assert!(score >= previous, "{id} dropped at level {level}");
            assert!((1..=4).contains(&score), "{id} out of scale at level {level}");
            previous = score;
        }
        assert_eq!(previous, 4, "{id} never reached the top band");
    }
}

#[test]
fn rising_rejections_never_raise_the_score() {
    let id = criterion(KpiCategory::TaskAccommodation, Section::Outside, 1);
    let mut previous = u8::MAX;
    for rejected in 0..=10 {
        let mut metrics = MetricsSnapshot::default();
        metrics.reports.total_submitted = 10.0;
        metrics.reports.rejected = f64::from(rejected);
        let score = auto_score(&id, &metrics);
        assert!(score <= previous, "score rose at {rejected} rejections");
        previous = score;
    }
    assert_eq!(previous, 1);
}

#[test]
fn participation_needs_both_response_rate_and_logins() {
    let id = criterion(KpiCategory::VolunteerParticipation, Section::Inside, 0);
    let mut metrics = MetricsSnapshot::default();
    metrics.notifications.response_rate = 95.0;
    metrics.system_engagement.login_frequency_per_week = 1.0;
    assert_eq!(auto_score(&id, &metrics), 1);

    metrics.system_engagement.login_frequency_per_week = 2.0;
    assert_eq!(auto_score(&id, &metrics), 2);

    metrics.system_engagement.login_frequency_per_week = 4.0;
    assert_eq!(auto_score(&id, &metrics), 4);
}

#[test]
fn percent_strings_are_accepted_by_the_scorer() {
    let metrics: MetricsSnapshot = serde_json::from_value(json!({
        "reports": { "approval_rate": "91%", "total_submitted": "4" }
    }))
    .expect("metrics decode");

    let approval = criterion(KpiCategory::TaskAccommodation, Section::Inside, 0);
    assert_eq!(auto_score(&approval, &metrics), 4);
    let volume = criterion(KpiCategory::VolunteerParticipation, Section::Outside, 0);
    assert_eq!(auto_score(&volume, &metrics), 2);
}

#[test]
fn validate_names_the_single_missing_criterion() {
    let mut data = EvaluationData::blank();
    for id in CriterionId::all() {
        data.set(&id, 3);
    }
    let left_out = criterion(KpiCategory::CommunicationEffectiveness, Section::Inside, 2);
    data.set(&left_out, 0);

    assert_eq!(validate(&data), vec![left_out]);
}

#[test]
fn preview_combines_auto_scores_with_overrides() {
    let mut overrides = EvaluationData::default();
    for id in manual_only_criteria() {
        overrides.set(&id, 2);
    }
    let approval = criterion(KpiCategory::TaskAccommodation, Section::Inside, 0);
    overrides.set(&approval, 1);

    let preview = score_preview(&strong_metrics(), Some(&overrides)).expect("preview builds");

    assert!(preview.missing.is_empty());
    assert_eq!(preview.evaluation_data.score(&approval), 1);
    let row = preview
        .criteria
        .iter()
        .find(|row| {
            row.category == approval.category()
                && row.section == approval.section()
                && row.index == approval.index()
        })
        .expect("row present");
    assert_eq!(row.auto_score, 4);
    assert_eq!(row.score, 1);
    assert_eq!(preview.total_score, total_score(&preview.evaluation_data));
}

#[test]
fn preview_without_overrides_reports_manual_gaps() {
    let preview = score_preview(&strong_metrics(), None).expect("preview builds");
    assert_eq!(preview.missing, manual_only_criteria());
    assert_eq!(preview.criteria.len(), 18);
}

#[test]
fn preview_rejects_unknown_slots() {
    let overrides: EvaluationData = serde_json::from_value(json!({
        "Team Objective Above Self": { "scores": { "outside_9": 3 } }
    }))
    .expect("overrides decode");

    assert!(matches!(
        score_preview(&strong_metrics(), Some(&overrides)),
        Err(EvaluationDataError::Catalog(_))
    ));
}
