//! Multi-message session evaluation.
//!
//! Each message goes through the [`Analyzer`], its markers through the
//! [`MarkerDetector`], and PHQ-9 / GAD-7 points accumulate across the
//! session. The per-message risk scores then give the session trajectory
//! and the counselor flag.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ERROR_LEVEL;
use crate::benchmark::BenchmarkCase;
use crate::collaborators::{Analyzer, MarkerDetector};
use crate::config::EvaluationConfig;
use crate::error::{CollaboratorResult, EvaluationError};
use crate::stats::{mean, ols_slope, ratio_or, SLOPE_EPSILON};
use crate::triage::TriageCategory;

/// Per-message slope above which a session is escalating.
///
/// Steeper than the cross-session pattern threshold.
pub const SESSION_ESCALATING_SLOPE: f64 = 0.05;

/// Per-message slope below which a session is improving.
pub const SESSION_IMPROVING_SLOPE: f64 = -0.05;

/// Accumulated PHQ-9 total that flags the session for a counselor.
pub const COUNSELOR_PHQ9_THRESHOLD: u32 = 10;

/// Accumulated GAD-7 total that flags the session for a counselor.
pub const COUNSELOR_GAD7_THRESHOLD: u32 = 10;

/// Direction of risk within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionTrajectory {
    Escalating,
    Improving,
    Stable,
    Crisis,
}

impl SessionTrajectory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionTrajectory::Escalating => "escalating",
            SessionTrajectory::Improving => "improving",
            SessionTrajectory::Stable => "stable",
            SessionTrajectory::Crisis => "crisis",
        }
    }
}

impl std::fmt::Display for SessionTrajectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify a session from its per-message scores and levels.
///
/// Any Crisis level forces [`SessionTrajectory::Crisis`]. Otherwise the OLS
/// slope must strictly exceed ±0.05.
pub fn classify_session_trajectory(
    scores: &[f64],
    levels: &[TriageCategory],
) -> SessionTrajectory {
    if levels.contains(&TriageCategory::Crisis) {
        return SessionTrajectory::Crisis;
    }
    let slope = ols_slope(scores);
    if slope > SESSION_ESCALATING_SLOPE + SLOPE_EPSILON {
        SessionTrajectory::Escalating
    } else if slope < SESSION_IMPROVING_SLOPE - SLOPE_EPSILON {
        SessionTrajectory::Improving
    } else {
        SessionTrajectory::Stable
    }
}

/// State after one analyzed message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    /// Zero-based position in the session.
    pub message_index: usize,
    pub risk_score: f64,
    pub risk_level: TriageCategory,
    /// Marker item ids found in this message.
    pub markers: Vec<String>,
    pub phq9_points: u32,
    pub gad7_points: u32,
    /// Running PHQ-9 total of detector points.
    pub cumulative_phq9: u32,
    /// Running GAD-7 total of detector points.
    pub cumulative_gad7: u32,
}

/// Whole-session result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionAnalysis {
    pub session_id: String,
    pub snapshots: Vec<SessionSnapshot>,
    pub final_risk_level: TriageCategory,
    pub trajectory: SessionTrajectory,
    pub slope: f64,
    pub mean_risk_score: f64,
    pub cumulative_phq9: u32,
    pub cumulative_gad7: u32,
    /// Union of snapshot markers, sorted.
    pub detected_markers: Vec<String>,
    pub needs_counselor: bool,
}

impl SessionAnalysis {
    fn from_snapshots(session_id: &str, snapshots: Vec<SessionSnapshot>) -> Self {
        let scores: Vec<f64> = snapshots.iter().map(|s| s.risk_score).collect();
        let levels: Vec<TriageCategory> = snapshots.iter().map(|s| s.risk_level).collect();
        let trajectory = classify_session_trajectory(&scores, &levels);

        let (cumulative_phq9, cumulative_gad7) = snapshots
            .last()
            .map(|s| (s.cumulative_phq9, s.cumulative_gad7))
            .unwrap_or((0, 0));
        let detected_markers: BTreeSet<String> = snapshots
            .iter()
            .flat_map(|s| s.markers.iter().cloned())
            .collect();

        let needs_counselor = levels.contains(&TriageCategory::Crisis)
            || cumulative_phq9 >= COUNSELOR_PHQ9_THRESHOLD
            || cumulative_gad7 >= COUNSELOR_GAD7_THRESHOLD
            || trajectory == SessionTrajectory::Escalating;

        Self {
            session_id: session_id.to_string(),
            final_risk_level: levels.last().copied().unwrap_or_default(),
            trajectory,
            slope: ols_slope(&scores),
            mean_risk_score: mean(&scores),
            cumulative_phq9,
            cumulative_gad7,
            detected_markers: detected_markers.into_iter().collect(),
            needs_counselor,
            snapshots,
        }
    }
}

/// Outcome of one session case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCaseResult {
    pub case_id: String,
    pub category: String,
    pub passed: bool,
    pub expected_risk_level: TriageCategory,
    /// Final level, or `"error"` when a collaborator failed.
    pub actual_risk_level: String,
    pub trajectory_correct: bool,
    /// `None` when the case declares no PHQ-9 range.
    pub phq9_in_range: Option<bool>,
    /// Reported only; not part of the pass decision.
    pub gad7_in_range: Option<bool>,
    /// Expected markers that were detected.
    pub markers_found: usize,
    pub markers_expected: usize,
    pub analysis: Option<SessionAnalysis>,
    pub error: Option<String>,
}

/// Suite-level session metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionTriageMetrics {
    pub total_sessions: usize,
    /// Fraction of sessions with the expected trajectory, 0.0 when empty.
    pub trajectory_accuracy: f64,
    /// Of expected-crisis sessions, fraction whose trajectory is Escalating
    /// or Crisis. 1.0 with none.
    pub escalation_recall: f64,
    /// Expected markers found over expected markers declared. 1.0 with none.
    pub marker_detection_rate: f64,
    /// Mean |range midpoint - accumulated PHQ-9| over cases declaring a range.
    pub phq9_mae: f64,
    /// Of sessions expected Crisis or Caution, fraction flagged. 1.0 with none.
    pub counselor_flag_accuracy: f64,
}

/// Full output of a session-triage run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTriageReport {
    pub metrics: SessionTriageMetrics,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<SessionCaseResult>,
}

fn trajectory_matches(case: &BenchmarkCase, actual: SessionTrajectory) -> bool {
    match case.expected_trajectory {
        Some(expected) => expected == actual,
        None if case.expected_risk_level == TriageCategory::Crisis => matches!(
            actual,
            SessionTrajectory::Escalating | SessionTrajectory::Crisis
        ),
        None => actual != SessionTrajectory::Crisis,
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Runs multi-message cases through an [`Analyzer`] and [`MarkerDetector`].
pub struct SessionTriageEvaluator {
    analyzer: Arc<dyn Analyzer>,
    detector: Arc<dyn MarkerDetector>,
    placeholder_entity: String,
    concurrency: usize,
}

/// Builder for [`SessionTriageEvaluator`].
pub struct SessionTriageEvaluatorBuilder {
    analyzer: Option<Arc<dyn Analyzer>>,
    detector: Option<Arc<dyn MarkerDetector>>,
    placeholder_entity: String,
    concurrency: usize,
}

impl Default for SessionTriageEvaluatorBuilder {
    fn default() -> Self {
        Self::from_config(&EvaluationConfig::default())
    }
}

impl SessionTriageEvaluatorBuilder {
    /// Start from evaluation settings.
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self {
            analyzer: None,
            detector: None,
            placeholder_entity: config.placeholder_entity.clone(),
            concurrency: config.concurrency,
        }
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn marker_detector(mut self, detector: Arc<dyn MarkerDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn placeholder_entity(mut self, entity: impl Into<String>) -> Self {
        self.placeholder_entity = entity.into();
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Build the evaluator. Both collaborators are required.
    pub fn build(self) -> Result<SessionTriageEvaluator, EvaluationError> {
        let analyzer = self.analyzer.ok_or_else(|| EvaluationError::MissingCollaborator {
            name: "analyzer".to_string(),
        })?;
        let detector = self.detector.ok_or_else(|| EvaluationError::MissingCollaborator {
            name: "marker_detector".to_string(),
        })?;
        if self.concurrency == 0 {
            return Err(EvaluationError::InvalidConfig {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        Ok(SessionTriageEvaluator {
            analyzer,
            detector,
            placeholder_entity: self.placeholder_entity,
            concurrency: self.concurrency,
        })
    }
}

impl SessionTriageEvaluator {
    /// Start a builder with default settings.
    pub fn builder() -> SessionTriageEvaluatorBuilder {
        SessionTriageEvaluatorBuilder::default()
    }

    /// Analyze an ordered message list as one session.
    ///
    /// Each message receives the previous message's risk score as prior.
    pub async fn analyze_session(
        &self,
        session_id: &str,
        messages: &[&str],
    ) -> CollaboratorResult<SessionAnalysis> {
        let mut snapshots: Vec<SessionSnapshot> = Vec::with_capacity(messages.len());
        let mut cumulative_phq9 = 0u32;
        let mut cumulative_gad7 = 0u32;

        for (index, text) in messages.iter().enumerate() {
            let message_id = format!("{}_msg_{}", session_id, index);
            let prior = snapshots.last().map(|s| s.risk_score);
            let analysis = self
                .analyzer
                .analyze(&message_id, session_id, &self.placeholder_entity, text, prior)
                .await?;

            let phq9_points = self.detector.calculate_phq9_score(&analysis.markers);
            let gad7_points = self.detector.calculate_gad7_score(&analysis.markers);
            cumulative_phq9 = cumulative_phq9.saturating_add(phq9_points);
            cumulative_gad7 = cumulative_gad7.saturating_add(gad7_points);

            snapshots.push(SessionSnapshot {
                message_index: index,
                risk_score: analysis.risk_score,
                risk_level: analysis.risk_level,
                markers: analysis.markers.into_iter().map(|m| m.item_id).collect(),
                phq9_points,
                gad7_points,
                cumulative_phq9,
                cumulative_gad7,
            });
        }

        let analysis = SessionAnalysis::from_snapshots(session_id, snapshots);
        debug!(
            session_id = %session_id,
            trajectory = %analysis.trajectory,
            phq9 = analysis.cumulative_phq9,
            gad7 = analysis.cumulative_gad7,
            needs_counselor = analysis.needs_counselor,
            "Session analyzed"
        );
        Ok(analysis)
    }

    /// Run one case: session context first, input text last.
    pub async fn evaluate_case(&self, case: &BenchmarkCase) -> SessionCaseResult {
        let messages = case.messages();
        let markers_expected = case.expected_markers.len();

        let analysis = match self.analyze_session(&case.case_id, &messages).await {
            Ok(a) => a,
            Err(e) => {
                warn!(case_id = %case.case_id, error = %e, "Analyzer failed on session");
                return SessionCaseResult {
                    case_id: case.case_id.clone(),
                    category: case.category.clone(),
                    passed: false,
                    expected_risk_level: case.expected_risk_level,
                    actual_risk_level: ERROR_LEVEL.to_string(),
                    trajectory_correct: false,
                    phq9_in_range: case.expected_phq9_range.map(|_| false),
                    gad7_in_range: case.expected_gad7_range.map(|_| false),
                    markers_found: 0,
                    markers_expected,
                    analysis: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let level_ok = analysis.final_risk_level == case.expected_risk_level;
        let phq9_in_range = case
            .expected_phq9_range
            .map(|r| r.contains(analysis.cumulative_phq9));
        let gad7_in_range = case
            .expected_gad7_range
            .map(|r| r.contains(analysis.cumulative_gad7));
        let markers_found = case
            .expected_markers
            .iter()
            .filter(|m| analysis.detected_markers.contains(m))
            .count();

        let passed = level_ok && phq9_in_range.unwrap_or(true) && markers_found == markers_expected;

        SessionCaseResult {
            case_id: case.case_id.clone(),
            category: case.category.clone(),
            passed,
            expected_risk_level: case.expected_risk_level,
            actual_risk_level: analysis.final_risk_level.to_string(),
            trajectory_correct: trajectory_matches(case, analysis.trajectory),
            phq9_in_range,
            gad7_in_range,
            markers_found,
            markers_expected,
            analysis: Some(analysis),
            error: None,
        }
    }

    /// Evaluate a suite. Sessions run concurrently; results keep suite order.
    pub async fn evaluate_suite(&self, cases: &[BenchmarkCase]) -> SessionTriageReport {
        let results: Vec<SessionCaseResult> = stream::iter(cases.iter().map(|c| self.evaluate_case(c)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let metrics = session_metrics(cases, &results);
        let passed = results.iter().filter(|r| r.passed).count();
        info!(
            total = metrics.total_sessions,
            passed = passed,
            trajectory_accuracy = metrics.trajectory_accuracy,
            escalation_recall = metrics.escalation_recall,
            "Session triage evaluation complete"
        );

        SessionTriageReport {
            metrics,
            passed,
            failed: results.len() - passed,
            results,
        }
    }
}

/// Aggregate session results. `cases` and `results` are index-aligned.
pub fn session_metrics(cases: &[BenchmarkCase], results: &[SessionCaseResult]) -> SessionTriageMetrics {
    let total = results.len();
    let pairs = || cases.iter().zip(results.iter());

    let trajectory_correct = results.iter().filter(|r| r.trajectory_correct).count();

    let crisis_expected: Vec<&SessionCaseResult> = pairs()
        .filter(|(c, _)| c.expected_risk_level == TriageCategory::Crisis)
        .map(|(_, r)| r)
        .collect();
    let escalated = crisis_expected
        .iter()
        .filter(|r| {
            r.analysis.as_ref().is_some_and(|a| {
                matches!(
                    a.trajectory,
                    SessionTrajectory::Escalating | SessionTrajectory::Crisis
                )
            })
        })
        .count();

    let markers_expected: usize = results.iter().map(|r| r.markers_expected).sum();
    let markers_found: usize = results.iter().map(|r| r.markers_found).sum();

    let phq9_errors: Vec<f64> = pairs()
        .filter_map(|(c, r)| {
            let range = c.expected_phq9_range?;
            let actual = r.analysis.as_ref()?.cumulative_phq9;
            Some((range.midpoint() - f64::from(actual)).abs())
        })
        .collect();

    let flag_expected: Vec<&SessionCaseResult> = pairs()
        .filter(|(c, _)| c.expected_risk_level != TriageCategory::Safe)
        .map(|(_, r)| r)
        .collect();
    let flagged = flag_expected
        .iter()
        .filter(|r| r.analysis.as_ref().is_some_and(|a| a.needs_counselor))
        .count();

    SessionTriageMetrics {
        total_sessions: total,
        trajectory_accuracy: ratio_or(trajectory_correct as f64, total as f64, 0.0),
        escalation_recall: ratio_or(escalated as f64, crisis_expected.len() as f64, 1.0),
        marker_detection_rate: ratio_or(markers_found as f64, markers_expected as f64, 1.0),
        phq9_mae: mean(&phq9_errors),
        counselor_flag_accuracy: ratio_or(flagged as f64, flag_expected.len() as f64, 1.0),
    }
}
