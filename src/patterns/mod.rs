//! Longitudinal risk pattern detection.
//!
//! Builds a [`ContextWindow`] of a student's past sessions from the
//! [`VectorStore`] and classifies the shape of the risk trajectory:
//!
//! ```text
//! VectorStore → ContextWindow → trajectory → PatternMatch (+ recommendation)
//! ```
//!
//! Rules are checked in a fixed order, first match wins:
//!
//! | Rule | Condition                          | Pattern    | Confidence                  |
//! |------|------------------------------------|------------|-----------------------------|
//! | 1    | fewer than 2 points                | Stable     | 0.5                         |
//! | 2    | max >= 0.8 and last >= 0.7         | Acute      | 0.85                        |
//! | 3    | slope > 0.03                       | Escalating | min(0.9, 0.6 + 3 * abs(slope)) |
//! | 4    | slope < -0.03                      | Improving  | min(0.9, 0.6 + 3 * abs(slope)) |
//! | 5    | variance > 0.03                    | Cyclical   | min(0.8, 0.5 + 5 * variance)   |
//! | 6    | mean > 0.4                         | Chronic    | 0.7                         |
//! | 7    | otherwise                          | Stable     | 0.75                        |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::stats::{mean, ols_slope, sample_variance, SLOPE_EPSILON};
use crate::store::{Document, SearchResult, VectorStore};

/// Risk score assumed for documents that carry none.
pub const DEFAULT_RISK_SCORE: f64 = 0.3;
/// Cross-session slope above which a trajectory is Escalating.
pub const ESCALATING_SLOPE: f64 = 0.03;
/// Cross-session slope below which a trajectory is Improving.
pub const IMPROVING_SLOPE: f64 = -0.03;
/// Variance above which a flat trajectory is Cyclical.
pub const CYCLICAL_VARIANCE: f64 = 0.03;
/// Mean above which a flat, steady trajectory is Chronic.
pub const CHRONIC_MEAN: f64 = 0.4;
/// Peak score that, together with [`ACUTE_LAST`], marks an Acute episode.
pub const ACUTE_PEAK: f64 = 0.8;
/// Most recent score that, together with [`ACUTE_PEAK`], marks an Acute episode.
pub const ACUTE_LAST: f64 = 0.7;
/// Most recent score at or above which the recommendation is flagged urgent.
pub const HIGH_URGENCY_LAST: f64 = 0.7;

const HIGH_URGENCY_PREFIX: &str = "[HIGH URGENCY] ";
const INSUFFICIENT_DATA: &str = "insufficient data for pattern analysis; continue routine check-ins";

// ============================================================================
// Types
// ============================================================================

/// Shape of a risk trajectory across sessions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Risk rising steadily
    Escalating,
    /// Persistently elevated risk
    Chronic,
    /// Risk oscillating without a trend
    Cyclical,
    /// Recent severe spike
    Acute,
    /// Risk falling steadily
    Improving,
    /// Low, steady risk
    Stable,
}

impl PatternType {
    /// Every pattern, in rule order.
    pub const ALL: [PatternType; 6] = [
        PatternType::Acute,
        PatternType::Escalating,
        PatternType::Improving,
        PatternType::Cyclical,
        PatternType::Chronic,
        PatternType::Stable,
    ];

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Escalating => "escalating",
            PatternType::Chronic => "chronic",
            PatternType::Cyclical => "cyclical",
            PatternType::Acute => "acute",
            PatternType::Improving => "improving",
            PatternType::Stable => "stable",
        }
    }

    /// Fixed recommendation template for this pattern.
    pub fn recommendation(&self) -> &'static str {
        match self {
            PatternType::Acute => {
                "urgent crisis intervention: contact the student today and follow the crisis protocol"
            }
            PatternType::Escalating => {
                "proactive outreach within 24-48h: risk has been rising across recent sessions"
            }
            PatternType::Chronic => {
                "refer for ongoing counseling: risk has stayed elevated across sessions"
            }
            PatternType::Cyclical => {
                "schedule regular check-ins: risk rises and falls without a clear trend"
            }
            PatternType::Improving => {
                "continue current support: risk has been falling across recent sessions"
            }
            PatternType::Stable => "routine monitoring: no change in support needed",
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Documents retrieved for one analysis.
#[derive(Debug, Clone, Default)]
pub struct ContextWindow {
    /// Retrieved documents, in retrieval order.
    pub documents: Vec<Arc<Document>>,
    /// Relevance of each document (similarity, or 1.0 for plain history).
    pub relevance_scores: Vec<f64>,
    /// Days between the earliest and latest document.
    pub time_span_days: f64,
    /// Number of sessions in the window (one document per session).
    pub session_count: usize,
}

impl ContextWindow {
    /// Build a window, deriving the time span and session count.
    pub fn new(documents: Vec<Arc<Document>>, relevance_scores: Vec<f64>) -> Self {
        let time_span_days = time_span_days(&documents);
        let session_count = documents.len();
        Self {
            documents,
            relevance_scores,
            time_span_days,
            session_count,
        }
    }

    /// True when the window holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn time_span_days(documents: &[Arc<Document>]) -> f64 {
    let times: Vec<DateTime<Utc>> = documents.iter().map(|d| d.created_at).collect();
    match (times.iter().min(), times.iter().max()) {
        (Some(first), Some(last)) => (*last - *first).num_seconds() as f64 / 86_400.0,
        _ => 0.0,
    }
}

/// Classified risk trajectory for one student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternMatch {
    /// Detected pattern.
    pub pattern: PatternType,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Session ids backing the judgment, in retrieval order.
    pub supporting_sessions: Vec<String>,
    /// Risk scores in retrieval order.
    pub risk_trajectory: Vec<f64>,
    /// Action text for the counselor.
    pub recommendation: String,
}

// ============================================================================
// Pattern Analyzer
// ============================================================================

/// Classifies longitudinal risk trajectories from stored session summaries.
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    store: Arc<VectorStore>,
}

impl PatternAnalyzer {
    /// Create an analyzer reading from `store`.
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    /// Gather up to `max_sessions` documents for an entity.
    ///
    /// With a query, documents come from an entity-filtered similarity search
    /// and carry their similarity as relevance. Without one, the oldest
    /// `max_sessions` history entries are used with relevance 1.0.
    pub fn get_context_window(
        &self,
        entity_hash: &str,
        query: Option<&str>,
        max_sessions: usize,
    ) -> ContextWindow {
        let (documents, relevance_scores) = match query {
            Some(q) => self
                .store
                .search(q, Some(entity_hash), max_sessions, 0.0)
                .into_iter()
                .map(|r| (r.document, r.similarity))
                .unzip(),
            None => {
                let history = self.store.get_entity_history(entity_hash, max_sessions);
                let scores = vec![1.0; history.len()];
                (history, scores)
            }
        };

        let window = ContextWindow::new(documents, relevance_scores);
        debug!(
            entity = %entity_hash,
            documents = window.documents.len(),
            time_span_days = window.time_span_days,
            "Context window built"
        );
        window
    }

    /// Classify the risk trajectory of a context window.
    pub fn analyze_pattern(&self, context: &ContextWindow) -> PatternMatch {
        if context.is_empty() {
            return PatternMatch {
                pattern: PatternType::Stable,
                confidence: 0.5,
                supporting_sessions: Vec::new(),
                risk_trajectory: Vec::new(),
                recommendation: INSUFFICIENT_DATA.to_string(),
            };
        }

        let risk_trajectory: Vec<f64> = context
            .documents
            .iter()
            .map(|d| d.risk_score().unwrap_or(DEFAULT_RISK_SCORE))
            .collect();
        let supporting_sessions: Vec<String> = context
            .documents
            .iter()
            .map(|d| d.session_id().unwrap_or(&d.id).to_string())
            .collect();

        let (pattern, confidence) = classify_trajectory(&risk_trajectory);
        let recommendation = build_recommendation(pattern, &risk_trajectory);

        info!(
            pattern = %pattern,
            confidence = confidence,
            sessions = risk_trajectory.len(),
            "Risk pattern classified"
        );

        PatternMatch {
            pattern,
            confidence,
            supporting_sessions,
            risk_trajectory,
            recommendation,
        }
    }

    /// Context window plus classification in one call.
    pub fn analyze_entity(
        &self,
        entity_hash: &str,
        query: Option<&str>,
        max_sessions: usize,
    ) -> PatternMatch {
        let context = self.get_context_window(entity_hash, query, max_sessions);
        self.analyze_pattern(&context)
    }

    /// Search the whole store for sessions similar to `query_text`, skipping
    /// documents of `exclude_entity`.
    ///
    /// Oversamples by 2x before filtering, then truncates to `top_k` and
    /// re-ranks from 1.
    pub fn find_similar_cases(
        &self,
        query_text: &str,
        exclude_entity: Option<&str>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        self.store
            .search(query_text, None, top_k.saturating_mul(2), 0.0)
            .into_iter()
            .filter(|r| match exclude_entity {
                Some(excluded) => r.document.entity_hash() != Some(excluded),
                None => true,
            })
            .take(top_k)
            .enumerate()
            .map(|(i, r)| SearchResult { rank: i + 1, ..r })
            .collect()
    }
}

/// Apply the ordered classification rules to a trajectory.
pub fn classify_trajectory(trajectory: &[f64]) -> (PatternType, f64) {
    if trajectory.len() < 2 {
        return (PatternType::Stable, 0.5);
    }

    let slope = ols_slope(trajectory);
    let variance = sample_variance(trajectory);
    let peak = trajectory.iter().copied().fold(f64::MIN, f64::max);
    let last = trajectory[trajectory.len() - 1];

    if peak >= ACUTE_PEAK && last >= ACUTE_LAST {
        (PatternType::Acute, 0.85)
    } else if slope > ESCALATING_SLOPE + SLOPE_EPSILON {
        (PatternType::Escalating, (0.6 + 3.0 * slope.abs()).min(0.9))
    } else if slope < IMPROVING_SLOPE - SLOPE_EPSILON {
        (PatternType::Improving, (0.6 + 3.0 * slope.abs()).min(0.9))
    } else if variance > CYCLICAL_VARIANCE {
        (PatternType::Cyclical, (0.5 + 5.0 * variance).min(0.8))
    } else if mean(trajectory) > CHRONIC_MEAN {
        (PatternType::Chronic, 0.7)
    } else {
        (PatternType::Stable, 0.75)
    }
}

fn build_recommendation(pattern: PatternType, trajectory: &[f64]) -> String {
    let urgent = trajectory.last().is_some_and(|&last| last >= HIGH_URGENCY_LAST);
    if urgent {
        format!("{}{}", HIGH_URGENCY_PREFIX, pattern.recommendation())
    } else {
        pattern.recommendation().to_string()
    }
}
