use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used when checking that the category weights add up to one.
pub const WEIGHT_TOLERANCE: f64 = 0.001;

/// The four KPI categories an associate group is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KpiCategory {
    #[serde(rename = "Volunteer Participation")]
    VolunteerParticipation,
    #[serde(rename = "Task Accommodation and Completion")]
    TaskAccommodation,
    #[serde(rename = "Communication Effectiveness")]
    CommunicationEffectiveness,
    #[serde(rename = "Team Objective Above Self")]
    TeamObjective,
}

impl KpiCategory {
    pub const ALL: [KpiCategory; 4] = [
        KpiCategory::VolunteerParticipation,
        KpiCategory::TaskAccommodation,
        KpiCategory::CommunicationEffectiveness,
        KpiCategory::TeamObjective,
    ];

    pub fn label(self) -> &'static str {
        match self {
            KpiCategory::VolunteerParticipation => "Volunteer Participation",
            KpiCategory::TaskAccommodation => "Task Accommodation and Completion",
            KpiCategory::CommunicationEffectiveness => "Communication Effectiveness",
            KpiCategory::TeamObjective => "Team Objective Above Self",
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            KpiCategory::VolunteerParticipation => 0.25,
            KpiCategory::TaskAccommodation => 0.30,
            KpiCategory::CommunicationEffectiveness => 0.15,
            KpiCategory::TeamObjective => 0.30,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(label.trim()))
    }

    /// Every criterion slot of the category in catalog order.
    pub fn criteria(self) -> impl Iterator<Item = CriterionId> {
        Section::ALL.into_iter().flat_map(move |section| {
            (0..criteria_text(self, section).len()).map(move |index| CriterionId {
                category: self,
                section,
                index,
            })
        })
    }
}

impl fmt::Display for KpiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a criterion concerns conduct inside or outside the coalition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Inside,
    Outside,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Inside, Section::Outside];

    pub fn label(self) -> &'static str {
        match self {
            Section::Inside => "Inside the coalition",
            Section::Outside => "Outside the coalition",
        }
    }

    pub(crate) fn key(self) -> &'static str {
        match self {
            Section::Inside => "inside",
            Section::Outside => "outside",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "inside" => Some(Section::Inside),
            "outside" => Some(Section::Outside),
            _ => None,
        }
    }
}

/// Ordered criterion statements for one category section.
pub fn criteria_text(category: KpiCategory, section: Section) -> &'static [&'static str] {
    use KpiCategory::*;
    use Section::*;

    match (category, section) {
        (VolunteerParticipation, Inside) => &[
            "Actively participates in meetings, trainings, and other activities without constant reminders",
            "Suggests and leads new activities",
        ],
        (VolunteerParticipation, Outside) => &[
            "Helps in operations or field activities without reminders from their supervisor or others",
            "Pursues objectives despite challenges and obstacles",
        ],
        (TaskAccommodation, Inside) => &[
            "The team consistently meets collective deadlines and maintains quality standards",
            "Effectively aligns group workflows with coalition plans",
        ],
        (TaskAccommodation, Outside) => &[
            "Successfully completes most tasks independently but asks for additional support, as appropriate, when faced with unfamiliar situations",
            "The group demonstrates resilience and adaptability when handling unfamiliar external requirements",
        ],
        (CommunicationEffectiveness, Inside) => &[
            "Shares new knowledge and ideas with others freely or during discussions",
            "Actively listens and provides constructive feedback during meetings",
            "Responds constructively in meetings and coordination efforts",
        ],
        (CommunicationEffectiveness, Outside) => &[
            "Seeks and effectively uses feedback from others to assess and improve own performance",
            "Communicates clearly and respectfully with the public",
        ],
        (TeamObjective, Inside) => &[
            "Treats others fairly and with respect",
            "Encourages listening to other's ideas to address conflicts within the coalition",
            "Works toward coalition goals and helps involve others",
        ],
        (TeamObjective, Outside) => &[
            "Uses team member's skills, experience, knowledge, and creativity to resolve problems and handle tasks in the community",
            "Works well with other groups in the coalition to achieve common goals",
        ],
    }
}

/// A criterion slot. Only constructible for positions that exist in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CriterionId {
    category: KpiCategory,
    section: Section,
    index: usize,
}

impl CriterionId {
    pub fn new(category: KpiCategory, section: Section, index: usize) -> Result<Self, CatalogError> {
        if index < criteria_text(category, section).len() {
            Ok(Self {
                category,
                section,
                index,
            })
        } else {
            Err(CatalogError::UnknownCriterion {
                category,
                section,
                index,
            })
        }
    }

    /// Every criterion in the catalog, category by category.
    pub fn all() -> impl Iterator<Item = CriterionId> {
        KpiCategory::ALL
            .into_iter()
            .flat_map(|category| category.criteria())
    }

    pub fn category(&self) -> KpiCategory {
        self.category
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &'static str {
        criteria_text(self.category, self.section)[self.index]
    }

    /// Key of this slot inside a category's `scores` map, e.g. `outside_1`.
    pub fn slot_key(&self) -> String {
        format!("{}_{}", self.section.key(), self.index)
    }

    pub fn from_slot_key(category: KpiCategory, key: &str) -> Result<Self, CatalogError> {
        let unknown = || CatalogError::UnknownSlot {
            category,
            key: key.to_string(),
        };
        let (section, index) = key.split_once('_').ok_or_else(unknown)?;
        let section = Section::from_key(section).ok_or_else(unknown)?;
        let index = index.parse::<usize>().map_err(|_| unknown())?;
        Self::new(category, section, index).map_err(|_| unknown())
    }
}

impl<'de> Deserialize<'de> for CriterionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            category: KpiCategory,
            section: Section,
            index: usize,
        }

        let raw = Raw::deserialize(deserializer)?;
        CriterionId::new(raw.category, raw.section, raw.index).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for CriterionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {}",
            self.category.label(),
            self.section.label(),
            self.index
        )
    }
}

/// Confirms the fixed category weights still sum to one.
pub fn verify_weights() -> Result<(), CatalogError> {
    let sum: f64 = KpiCategory::ALL.iter().map(|category| category.weight()).sum();
    if (sum - 1.0).abs() <= WEIGHT_TOLERANCE {
        Ok(())
    } else {
        Err(CatalogError::WeightSum(sum))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("category weights sum to {0:.3}, expected 1.000")]
    WeightSum(f64),
    #[error("no criterion {index} in {category} / {}", .section.label())]
    UnknownCriterion {
        category: KpiCategory,
        section: Section,
        index: usize,
    },
    #[error("unknown score slot '{key}' for {category}")]
    UnknownSlot { category: KpiCategory, key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        verify_weights().expect("weights balanced");
        let sum: f64 = KpiCategory::ALL.iter().map(|c| c.weight()).sum();
        assert!((sum - 1.0).abs() <= WEIGHT_TOLERANCE);
    }

    #[test]
    fn catalog_has_eighteen_criteria() {
        assert_eq!(CriterionId::all().count(), 18);
        assert_eq!(KpiCategory::CommunicationEffectiveness.criteria().count(), 5);
        assert_eq!(KpiCategory::VolunteerParticipation.criteria().count(), 4);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let err = CriterionId::new(KpiCategory::VolunteerParticipation, Section::Inside, 2)
            .expect_err("only two inside criteria");
        assert!(matches!(err, CatalogError::UnknownCriterion { index: 2, .. }));
    }

    #[test]
    fn slot_keys_round_trip() {
        for id in CriterionId::all() {
            let parsed = CriterionId::from_slot_key(id.category(), &id.slot_key())
                .expect("slot key parses");
            assert_eq!(parsed, id);
        }
        assert!(CriterionId::from_slot_key(KpiCategory::TeamObjective, "outside_2").is_err());
        assert!(CriterionId::from_slot_key(KpiCategory::TeamObjective, "middle_0").is_err());
    }

    #[test]
    fn category_labels_match_wire_names() {
        for category in KpiCategory::ALL {
            let json = serde_json::to_string(&category).expect("serializes");
            assert_eq!(json, format!("\"{}\"", category.label()));
            assert_eq!(KpiCategory::from_label(category.label()), Some(category));
        }
    }
}
