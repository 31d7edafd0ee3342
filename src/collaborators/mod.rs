//! Capability interfaces the evaluators are built around.
//!
//! - [`Scanner`]: single message to risk level, bypass flag and keywords
//! - [`Analyzer`]: message in session context to risk score and clinical markers
//! - [`MarkerDetector`]: clinical markers to PHQ-9 / GAD-7 points
//!
//! Implementations are injected at construction. [`KeywordScanner`] is a
//! deterministic reference scanner for smoke runs.

mod keyword;

pub use keyword::KeywordScanner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorResult;
use crate::triage::TriageCategory;

/// Output of a [`Scanner`] call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanResult {
    /// Classified risk level.
    pub risk_level: TriageCategory,
    /// True when a deterministic crisis signal skipped generative handling.
    pub bypass_llm: bool,
    /// Risk score in `[0, 1]`.
    pub risk_score: f64,
    /// Keywords that drove the decision.
    #[serde(default)]
    pub matched_keywords: Vec<String>,
}

/// A clinical marker detected in a message, keyed by questionnaire item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ClinicalMarker {
    /// Questionnaire item identifier (e.g. `phq9_item9`).
    pub item_id: String,
}

impl ClinicalMarker {
    /// Create a marker for `item_id`.
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
        }
    }
}

/// Output of an [`Analyzer`] call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageAnalysis {
    /// Risk score in `[0, 1]`.
    pub risk_score: f64,
    /// Classified risk level.
    pub risk_level: TriageCategory,
    /// Markers found in the message.
    #[serde(default)]
    pub markers: Vec<ClinicalMarker>,
}

/// Turns a single message into a risk classification.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan one message.
    async fn scan(
        &self,
        message_id: &str,
        text: &str,
        entity_id: &str,
    ) -> CollaboratorResult<ScanResult>;
}

/// Analyzes a message within its session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze one message. `prior_risk_score` is the previous message's
    /// score in the same session, if any.
    async fn analyze(
        &self,
        message_id: &str,
        session_id: &str,
        entity_id: &str,
        text: &str,
        prior_risk_score: Option<f64>,
    ) -> CollaboratorResult<MessageAnalysis>;
}

/// Converts markers into questionnaire points.
#[cfg_attr(test, mockall::automock)]
pub trait MarkerDetector: Send + Sync {
    /// PHQ-9 points contributed by `markers`.
    fn calculate_phq9_score(&self, markers: &[ClinicalMarker]) -> u32;

    /// GAD-7 points contributed by `markers`.
    fn calculate_gad7_score(&self, markers: &[ClinicalMarker]) -> u32;
}
