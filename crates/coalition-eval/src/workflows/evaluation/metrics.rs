//! Typed view of the performance metrics the backend reports for a subject.
//!
//! The backend payload is loosely shaped: counters may arrive as numbers or numeric strings
//! and whole sections may be missing or `null`. All of that is normalised here so the
//! scoring rules only ever see plain `f64` values where absent means zero.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    #[serde(deserialize_with = "null_as_default")]
    pub reports: ReportMetrics,
    #[serde(deserialize_with = "null_as_default")]
    pub volunteers: VolunteerMetrics,
    #[serde(deserialize_with = "null_as_default")]
    pub notifications: NotificationMetrics,
    #[serde(deserialize_with = "null_as_default")]
    pub system_engagement: EngagementMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportMetrics {
    #[serde(deserialize_with = "lenient_number")]
    pub total_submitted: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub approved: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub rejected: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub approval_rate: f64,
}

impl ReportMetrics {
    /// Share of submitted reports that were rejected, in percent. Zero when nothing was
    /// submitted.
    pub fn rejection_percent(&self) -> f64 {
        if self.total_submitted > 0.0 {
            self.rejected / self.total_submitted * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolunteerMetrics {
    #[serde(deserialize_with = "lenient_number")]
    pub recruited_in_period: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub total_count: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationMetrics {
    #[serde(deserialize_with = "lenient_number")]
    pub total_received: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub response_rate: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub acceptance_rate: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub accepted: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub declined: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub avg_response_time_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementMetrics {
    #[serde(deserialize_with = "lenient_number")]
    pub login_frequency_per_week: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub engagement_score: f64,
    pub engagement_level: Option<String>,
}

/// Metrics response as returned by the backend, with or without a `data` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MetricsPayload {
    Wrapped { data: MetricsSnapshot },
    Bare(MetricsSnapshot),
}

impl MetricsPayload {
    pub fn into_snapshot(self) -> MetricsSnapshot {
        match self {
            MetricsPayload::Wrapped { data } => data,
            MetricsPayload::Bare(snapshot) => snapshot,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberLike {
    Number(f64),
    Text(String),
    Flag(#[allow(dead_code)] bool),
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<NumberLike>::deserialize(deserializer)? {
        Some(NumberLike::Number(value)) => value,
        Some(NumberLike::Text(raw)) => raw.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        Some(NumberLike::Flag(_)) | None => 0.0,
    };

    Ok(if value.is_finite() { value } else { 0.0 })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
