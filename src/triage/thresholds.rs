//! PHQ-9 and GAD-7 severity bands.
//!
//! These labels are for display only. Triage goes through
//! [`CategoryMapper`](super::CategoryMapper), whose bands differ on purpose.

use serde::{Deserialize, Serialize};

/// Severity label attached to a questionnaire total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLabel {
    Minimal,
    Mild,
    Moderate,
    ModeratelySevere,
    Severe,
}

impl SeverityLabel {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLabel::Minimal => "minimal",
            SeverityLabel::Mild => "mild",
            SeverityLabel::Moderate => "moderate",
            SeverityLabel::ModeratelySevere => "moderately severe",
            SeverityLabel::Severe => "severe",
        }
    }
}

impl std::fmt::Display for SeverityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable band tables for the two questionnaires.
pub struct ClinicalThresholds;

impl ClinicalThresholds {
    /// Highest possible PHQ-9 total.
    pub const PHQ9_MAX: u32 = 27;
    /// Highest possible GAD-7 total.
    pub const GAD7_MAX: u32 = 21;

    /// Inclusive lower bounds, highest first.
    pub const PHQ9_BANDS: &'static [(u32, SeverityLabel)] = &[
        (20, SeverityLabel::Severe),
        (15, SeverityLabel::ModeratelySevere),
        (10, SeverityLabel::Moderate),
        (5, SeverityLabel::Mild),
        (0, SeverityLabel::Minimal),
    ];

    /// Inclusive lower bounds, highest first.
    pub const GAD7_BANDS: &'static [(u32, SeverityLabel)] = &[
        (15, SeverityLabel::Severe),
        (10, SeverityLabel::Moderate),
        (5, SeverityLabel::Mild),
        (0, SeverityLabel::Minimal),
    ];

    /// Severity label for a PHQ-9 total. Totals above 27 land in the top band.
    pub fn phq9_severity(total: u32) -> SeverityLabel {
        band(Self::PHQ9_BANDS, total)
    }

    /// Severity label for a GAD-7 total. Totals above 21 land in the top band.
    pub fn gad7_severity(total: u32) -> SeverityLabel {
        band(Self::GAD7_BANDS, total)
    }
}

fn band(table: &[(u32, SeverityLabel)], total: u32) -> SeverityLabel {
    table
        .iter()
        .find(|(floor, _)| total >= *floor)
        .map(|(_, label)| *label)
        .unwrap_or(SeverityLabel::Minimal)
}
