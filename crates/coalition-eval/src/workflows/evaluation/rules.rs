use super::catalog::{CriterionId, KpiCategory, Section};
use super::descriptor::metric_basis;
use super::metrics::MetricsSnapshot;

/// Score reported for criteria that need a human rating.
pub const UNSCORED: u8 = 0;

const APPROVAL_BANDS: [f64; 3] = [90.0, 75.0, 60.0];
const BLENDED_RATE_BANDS: [f64; 3] = [85.0, 70.0, 50.0];

/// Computes the automatic 1-4 score for a criterion, or [`UNSCORED`] when the criterion has
/// no metric basis.
pub fn auto_score(criterion: &CriterionId, metrics: &MetricsSnapshot) -> u8 {
    use KpiCategory::*;
    use Section::*;

    if metric_basis(criterion).is_none() {
        return UNSCORED;
    }

    let reports = &metrics.reports;
    let notifications = &metrics.notifications;

    match (criterion.category(), criterion.section(), criterion.index()) {
        (VolunteerParticipation, Inside, 0) => ladder_joint(
            notifications.response_rate,
            metrics.system_engagement.login_frequency_per_week,
            [(90.0, 4.0), (75.0, 3.0), (60.0, 2.0)],
        ),
        (VolunteerParticipation, Outside, 0) => ladder(reports.total_submitted, [12.0, 8.0, 4.0]),
        (VolunteerParticipation, Outside, 1) => ladder(reports.approval_rate, APPROVAL_BANDS),
        (TaskAccommodation, Inside, 0) => ladder(reports.approval_rate, APPROVAL_BANDS),
        (TaskAccommodation, Inside, 1) => ladder(
            mean(notifications.response_rate, notifications.acceptance_rate),
            BLENDED_RATE_BANDS,
        ),
        (TaskAccommodation, Outside, 0) => ladder_joint(
            reports.total_submitted,
            reports.approval_rate,
            [(10.0, 80.0), (6.0, 70.0), (3.0, 60.0)],
        ),
        (TaskAccommodation, Outside, 1) => ladder_capped(
            reports.total_submitted,
            reports.rejection_percent(),
            [(8.0, 10.0), (5.0, 20.0), (3.0, 30.0)],
        ),
        (CommunicationEffectiveness, Outside, 0) => ladder(reports.approval_rate, APPROVAL_BANDS),
        (CommunicationEffectiveness, Outside, 1) => ladder_joint(
            reports.approval_rate,
            reports.total_submitted,
            [(85.0, 8.0), (70.0, 5.0), (60.0, 3.0)],
        ),
        (TeamObjective, Outside, 0) => {
            ladder(metrics.volunteers.recruited_in_period, [10.0, 6.0, 3.0])
        }
        (TeamObjective, Outside, 1) => ladder(
            mean(notifications.acceptance_rate, notifications.response_rate),
            BLENDED_RATE_BANDS,
        ),
        _ => UNSCORED,
    }
}

/// Auto scores for every criterion in catalog order.
pub fn auto_scores(metrics: &MetricsSnapshot) -> Vec<(CriterionId, u8)> {
    CriterionId::all()
        .map(|criterion| (criterion, auto_score(&criterion, metrics)))
        .collect()
}

fn mean(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

fn climb(passes: impl Fn(usize) -> bool) -> u8 {
    (0..3)
        .find(|band| passes(*band))
        .map(|band| 4 - band as u8)
        .unwrap_or(1)
}

/// Bands are the inclusive lower bounds for scores 4, 3 and 2.
fn ladder(value: f64, bands: [f64; 3]) -> u8 {
    climb(|band| value >= bands[band])
}

/// Both quantities must meet their lower bound.
fn ladder_joint(first: f64, second: f64, bands: [(f64, f64); 3]) -> u8 {
    climb(|band| first >= bands[band].0 && second >= bands[band].1)
}

/// `volume` must meet its lower bound while `ratio` stays at or under its cap.
fn ladder_capped(volume: f64, ratio: f64, bands: [(f64, f64); 3]) -> u8 {
    climb(|band| volume >= bands[band].0 && ratio <= bands[band].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_inclusive_and_defaults_to_one() {
        assert_eq!(ladder(90.0, APPROVAL_BANDS), 4);
        assert_eq!(ladder(89.99, APPROVAL_BANDS), 3);
        assert_eq!(ladder(75.0, APPROVAL_BANDS), 3);
        assert_eq!(ladder(60.0, APPROVAL_BANDS), 2);
        assert_eq!(ladder(59.0, APPROVAL_BANDS), 1);
        assert_eq!(ladder(0.0, APPROVAL_BANDS), 1);
    }

    #[test]
    fn joint_ladder_takes_weakest_quantity() {
        let bands = [(90.0, 4.0), (75.0, 3.0), (60.0, 2.0)];
        assert_eq!(ladder_joint(95.0, 4.0, bands), 4);
        assert_eq!(ladder_joint(95.0, 3.5, bands), 3);
        assert_eq!(ladder_joint(61.0, 10.0, bands), 2);
        assert_eq!(ladder_joint(95.0, 1.0, bands), 1);
    }

    #[test]
    fn capped_ladder_requires_low_ratio() {
        let bands = [(8.0, 10.0), (5.0, 20.0), (3.0, 30.0)];
        assert_eq!(ladder_capped(10.0, 10.0, bands), 4);
        assert_eq!(ladder_capped(10.0, 15.0, bands), 3);
        assert_eq!(ladder_capped(10.0, 30.0, bands), 2);
        assert_eq!(ladder_capped(10.0, 31.0, bands), 1);
        assert_eq!(ladder_capped(2.0, 0.0, bands), 1);
    }
}
