//! Triage categories and the deterministic mapping rules.
//!
//! - [`TriageCategory`]: the Safe / Caution / Crisis classification
//! - [`ClinicalCategory`]: typed clinical topics a free-text category resolves to
//! - [`ClinicalThresholds`]: PHQ-9 / GAD-7 severity labels (display only)
//! - [`CategoryMapper`]: scores, categories and decisions to triage

mod mapper;
mod thresholds;

pub use mapper::*;
pub use thresholds::*;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

// ============================================================================
// Triage Category
// ============================================================================

/// Three-level risk classification governing downstream handling.
///
/// Ordered `Safe < Caution < Crisis` so escalation is a `max`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TriageCategory {
    /// No elevated risk
    #[default]
    Safe,
    /// Elevated risk, needs follow-up
    Caution,
    /// Immediate risk, bypasses generative handling
    Crisis,
}

impl TriageCategory {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriageCategory::Safe => "safe",
            TriageCategory::Caution => "caution",
            TriageCategory::Crisis => "crisis",
        }
    }

    /// Raise to at least `floor`.
    pub fn at_least(self, floor: TriageCategory) -> Self {
        self.max(floor)
    }
}

impl std::fmt::Display for TriageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TriageCategory {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "safe" => Ok(TriageCategory::Safe),
            "caution" => Ok(TriageCategory::Caution),
            "crisis" => Ok(TriageCategory::Crisis),
            _ => Err(DataError::UnknownValue {
                field: "risk_level".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Clinical Category
// ============================================================================

/// Clinical topic a free-text category string resolves to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalCategory {
    SuicidalIdeation,
    SelfHarm,
    Depression,
    Anxiety,
    Trauma,
    SubstanceUse,
    EatingDisorder,
    Stress,
    Relationships,
    Academic,
    Sleep,
    GeneralSupport,
}

impl ClinicalCategory {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClinicalCategory::SuicidalIdeation => "suicidal ideation",
            ClinicalCategory::SelfHarm => "self-harm",
            ClinicalCategory::Depression => "depression",
            ClinicalCategory::Anxiety => "anxiety",
            ClinicalCategory::Trauma => "trauma",
            ClinicalCategory::SubstanceUse => "substance use",
            ClinicalCategory::EatingDisorder => "eating disorder",
            ClinicalCategory::Stress => "stress",
            ClinicalCategory::Relationships => "relationships",
            ClinicalCategory::Academic => "academic",
            ClinicalCategory::Sleep => "sleep",
            ClinicalCategory::GeneralSupport => "general support",
        }
    }

    /// Default triage before any severity adjustment.
    pub fn default_triage(&self) -> TriageCategory {
        match self {
            ClinicalCategory::SuicidalIdeation | ClinicalCategory::SelfHarm => {
                TriageCategory::Crisis
            }
            ClinicalCategory::Depression
            | ClinicalCategory::Anxiety
            | ClinicalCategory::Trauma
            | ClinicalCategory::SubstanceUse
            | ClinicalCategory::EatingDisorder => TriageCategory::Caution,
            ClinicalCategory::Stress
            | ClinicalCategory::Relationships
            | ClinicalCategory::Academic
            | ClinicalCategory::Sleep
            | ClinicalCategory::GeneralSupport => TriageCategory::Safe,
        }
    }
}

impl std::fmt::Display for ClinicalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
