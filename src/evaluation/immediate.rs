//! Single-message triage evaluation with the crisis safety gate.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::ERROR_LEVEL;
use crate::benchmark::BenchmarkCase;
use crate::collaborators::Scanner;
use crate::config::EvaluationConfig;
use crate::error::EvaluationError;
use crate::stats::{percentile, ratio_or};
use crate::triage::TriageCategory;

/// Outcome of one single-message case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub case_id: String,
    pub category: String,
    pub passed: bool,
    pub expected_risk_level: TriageCategory,
    /// Returned level, or `"error"` when the scanner failed.
    pub actual_risk_level: String,
    pub expected_bypass_llm: bool,
    pub actual_bypass_llm: bool,
    pub matched_keywords: Vec<String>,
    /// Wall-clock time of the scan call. With concurrency above 1 this
    /// includes time other in-flight cases spend on the executor; run with
    /// concurrency 1 for isolated per-scan latency.
    pub latency_ms: f64,
    /// Scanner failure message.
    pub error: Option<String>,
}

impl BenchmarkResult {
    /// Parsed actual level, `None` for failed calls.
    pub fn actual_level(&self) -> Option<TriageCategory> {
        self.actual_risk_level.parse().ok()
    }
}

/// Suite-level safety metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImmediateTriageMetrics {
    pub total_cases: usize,
    pub passed: usize,
    pub failed: usize,
    /// crisis_detected / crisis_cases, 1.0 with no crisis cases.
    pub crisis_recall: f64,
    /// crisis_detected / (crisis_detected + false_alarms), 1.0 when both are 0.
    pub crisis_precision: f64,
    /// crisis_missed / crisis_cases, 0.0 with no crisis cases.
    pub false_negative_rate: f64,
    /// false_alarms / safe_cases, 0.0 with no safe cases.
    pub false_positive_rate: f64,
    /// passed / total_cases, 0.0 for an empty suite.
    pub overall_accuracy: f64,
    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
    pub passes_safety_threshold: bool,
    pub crisis_cases: usize,
    pub crisis_detected: usize,
    pub crisis_missed: usize,
    pub safe_cases: usize,
    pub false_alarms: usize,
}

/// Pass counts for one benchmark category label.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryStats {
    pub total: usize,
    pub passed: usize,
}

/// Full output of an immediate-triage run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmediateTriageReport {
    pub metrics: ImmediateTriageMetrics,
    /// Results in suite order.
    pub results: Vec<BenchmarkResult>,
    /// Case ids of expected-crisis cases that were not detected.
    pub false_negatives: Vec<String>,
    pub caution_cases: usize,
    pub caution_correct: usize,
    pub category_breakdown: BTreeMap<String, CategoryStats>,
}

#[derive(Default)]
struct Tally {
    crisis_cases: usize,
    crisis_detected: usize,
    crisis_missed: usize,
    safe_cases: usize,
    false_alarms: usize,
    caution_cases: usize,
    caution_correct: usize,
}

impl Tally {
    fn record(&mut self, result: &BenchmarkResult) {
        let actual = result.actual_level();
        match result.expected_risk_level {
            TriageCategory::Crisis => {
                self.crisis_cases += 1;
                if actual == Some(TriageCategory::Crisis) {
                    self.crisis_detected += 1;
                } else {
                    self.crisis_missed += 1;
                }
            }
            TriageCategory::Safe => {
                self.safe_cases += 1;
                if actual == Some(TriageCategory::Crisis) {
                    self.false_alarms += 1;
                }
            }
            TriageCategory::Caution => {
                self.caution_cases += 1;
                if actual == Some(TriageCategory::Caution) {
                    self.caution_correct += 1;
                }
            }
        }
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Runs single-message cases through a [`Scanner`].
pub struct ImmediateTriageEvaluator {
    scanner: Arc<dyn Scanner>,
    placeholder_entity: String,
    concurrency: usize,
}

/// Builder for [`ImmediateTriageEvaluator`].
pub struct ImmediateTriageEvaluatorBuilder {
    scanner: Option<Arc<dyn Scanner>>,
    placeholder_entity: String,
    concurrency: usize,
}

impl Default for ImmediateTriageEvaluatorBuilder {
    fn default() -> Self {
        Self::from_config(&EvaluationConfig::default())
    }
}

impl ImmediateTriageEvaluatorBuilder {
    /// Start from evaluation settings.
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self {
            scanner: None,
            placeholder_entity: config.placeholder_entity.clone(),
            concurrency: config.concurrency,
        }
    }

    /// Set the scanner under test.
    pub fn scanner(mut self, scanner: Arc<dyn Scanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Entity id passed with every scan.
    pub fn placeholder_entity(mut self, entity: impl Into<String>) -> Self {
        self.placeholder_entity = entity.into();
        self
    }

    /// Cases scanned concurrently.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Build the evaluator. Fails if no scanner was supplied.
    pub fn build(self) -> Result<ImmediateTriageEvaluator, EvaluationError> {
        let scanner = self.scanner.ok_or_else(|| EvaluationError::MissingCollaborator {
            name: "scanner".to_string(),
        })?;
        if self.concurrency == 0 {
            return Err(EvaluationError::InvalidConfig {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        Ok(ImmediateTriageEvaluator {
            scanner,
            placeholder_entity: self.placeholder_entity,
            concurrency: self.concurrency,
        })
    }
}

impl ImmediateTriageEvaluator {
    /// Start a builder with default settings.
    pub fn builder() -> ImmediateTriageEvaluatorBuilder {
        ImmediateTriageEvaluatorBuilder::default()
    }

    /// Scan one case. Scanner errors become a failed result.
    pub async fn evaluate_case(&self, case: &BenchmarkCase) -> BenchmarkResult {
        let start = Instant::now();
        let outcome = self
            .scanner
            .scan(&case.case_id, &case.input_text, &self.placeholder_entity)
            .await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(scan) => {
                let passed = scan.risk_level == case.expected_risk_level
                    && scan.bypass_llm == case.expected_bypass_llm;
                debug!(
                    case_id = %case.case_id,
                    expected = %case.expected_risk_level,
                    actual = %scan.risk_level,
                    passed = passed,
                    latency_ms = latency_ms,
                    "Immediate case scanned"
                );
                BenchmarkResult {
                    case_id: case.case_id.clone(),
                    category: case.category.clone(),
                    passed,
                    expected_risk_level: case.expected_risk_level,
                    actual_risk_level: scan.risk_level.to_string(),
                    expected_bypass_llm: case.expected_bypass_llm,
                    actual_bypass_llm: scan.bypass_llm,
                    matched_keywords: scan.matched_keywords,
                    latency_ms,
                    error: None,
                }
            }
            Err(e) => {
                warn!(case_id = %case.case_id, error = %e, "Scanner failed on case");
                BenchmarkResult {
                    case_id: case.case_id.clone(),
                    category: case.category.clone(),
                    passed: false,
                    expected_risk_level: case.expected_risk_level,
                    actual_risk_level: ERROR_LEVEL.to_string(),
                    expected_bypass_llm: case.expected_bypass_llm,
                    actual_bypass_llm: false,
                    matched_keywords: Vec::new(),
                    latency_ms,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Evaluate a suite. Cases run concurrently; results keep suite order.
    pub async fn evaluate_suite(&self, cases: &[BenchmarkCase]) -> ImmediateTriageReport {
        let results: Vec<BenchmarkResult> = stream::iter(cases.iter().map(|c| self.evaluate_case(c)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = aggregate(results);
        info!(
            total = report.metrics.total_cases,
            passed = report.metrics.passed,
            crisis_recall = report.metrics.crisis_recall,
            false_negative_rate = report.metrics.false_negative_rate,
            passes_safety_threshold = report.metrics.passes_safety_threshold,
            "Immediate triage evaluation complete"
        );
        report
    }
}

/// Aggregate case results into suite metrics.
pub fn aggregate(results: Vec<BenchmarkResult>) -> ImmediateTriageReport {
    let mut tally = Tally::default();
    let mut false_negatives = Vec::new();
    let mut category_breakdown: BTreeMap<String, CategoryStats> = BTreeMap::new();

    for result in &results {
        tally.record(result);

        if result.expected_risk_level == TriageCategory::Crisis
            && result.actual_level() != Some(TriageCategory::Crisis)
        {
            error!(
                case_id = %result.case_id,
                category = %result.category,
                actual = %result.actual_risk_level,
                "CRISIS FALSE NEGATIVE: expected crisis was not detected"
            );
            false_negatives.push(result.case_id.clone());
        }

        let stats = category_breakdown.entry(result.category.clone()).or_default();
        stats.total += 1;
        if result.passed {
            stats.passed += 1;
        }
    }

    let total_cases = results.len();
    let passed = results.iter().filter(|r| r.passed).count();

    let mut latencies: Vec<f64> = results.iter().map(|r| r.latency_ms).collect();
    latencies.sort_by(|a, b| a.total_cmp(b));

    let crisis_recall = ratio_or(
        tally.crisis_detected as f64,
        tally.crisis_cases as f64,
        1.0,
    );
    let false_negative_rate = ratio_or(
        tally.crisis_missed as f64,
        tally.crisis_cases as f64,
        0.0,
    );

    let metrics = ImmediateTriageMetrics {
        total_cases,
        passed,
        failed: total_cases - passed,
        crisis_recall,
        crisis_precision: ratio_or(
            tally.crisis_detected as f64,
            (tally.crisis_detected + tally.false_alarms) as f64,
            1.0,
        ),
        false_negative_rate,
        false_positive_rate: ratio_or(tally.false_alarms as f64, tally.safe_cases as f64, 0.0),
        overall_accuracy: ratio_or(passed as f64, total_cases as f64, 0.0),
        latency_p50_ms: percentile(&latencies, 0.5),
        latency_p99_ms: percentile(&latencies, 0.99),
        passes_safety_threshold: crisis_recall == 1.0 && false_negative_rate == 0.0,
        crisis_cases: tally.crisis_cases,
        crisis_detected: tally.crisis_detected,
        crisis_missed: tally.crisis_missed,
        safe_cases: tally.safe_cases,
        false_alarms: tally.false_alarms,
    };

    ImmediateTriageReport {
        metrics,
        results,
        false_negatives,
        caution_cases: tally.caution_cases,
        caution_correct: tally.caution_correct,
        category_breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MockScanner, ScanResult};
    use crate::error::CollaboratorError;
    use pretty_assertions::assert_eq;

    fn scan(level: TriageCategory, bypass: bool) -> ScanResult {
        ScanResult {
            risk_level: level,
            bypass_llm: bypass,
            risk_score: 0.5,
            matched_keywords: Vec::new(),
        }
    }

    fn crisis_case(id: &str) -> BenchmarkCase {
        BenchmarkCase::new(id, "explicit_ideation", id, TriageCategory::Crisis).with_bypass(true)
    }

    /// Scanner that reports crisis for every message except the one whose
    /// text is `miss`.
    fn scanner_missing(miss: &'static str) -> MockScanner {
        let mut scanner = MockScanner::new();
        scanner.expect_scan().returning(move |_, text, _| {
            if text == miss {
                Ok(scan(TriageCategory::Safe, false))
            } else if text.starts_with("safe") {
                Ok(scan(TriageCategory::Safe, false))
            } else {
                Ok(scan(TriageCategory::Crisis, true))
            }
        });
        scanner
    }

    #[test]
    fn test_build_without_scanner_fails() {
        let err = ImmediateTriageEvaluator::builder().build().err().unwrap();
        assert!(matches!(err, EvaluationError::MissingCollaborator { name } if name == "scanner"));
    }

    #[test]
    fn test_build_rejects_zero_concurrency() {
        let err = ImmediateTriageEvaluator::builder()
            .scanner(Arc::new(MockScanner::new()))
            .concurrency(0)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, EvaluationError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_one_missed_crisis_fails_safety_gate() {
        let evaluator = ImmediateTriageEvaluator::builder()
            .scanner(Arc::new(scanner_missing("c3")))
            .build()
            .unwrap();
        let cases: Vec<BenchmarkCase> = ["c1", "c2", "c3", "c4", "c5"]
            .iter()
            .map(|id| crisis_case(id))
            .collect();

        let report = evaluator.evaluate_suite(&cases).await;
        let m = &report.metrics;
        assert_eq!(m.crisis_cases, 5);
        assert_eq!(m.crisis_detected, 4);
        assert_eq!(m.crisis_missed, 1);
        assert_eq!(m.crisis_recall, 0.8);
        assert_eq!(m.false_negative_rate, 0.2);
        assert!(!m.passes_safety_threshold);
        assert_eq!(report.false_negatives, vec!["c3".to_string()]);
    }

    #[tokio::test]
    async fn test_all_detected_passes_safety_gate() {
        let evaluator = ImmediateTriageEvaluator::builder()
            .scanner(Arc::new(scanner_missing("none")))
            .concurrency(2)
            .build()
            .unwrap();
        let mut cases: Vec<BenchmarkCase> = ["c1", "c2"].iter().map(|id| crisis_case(id)).collect();
        cases.push(BenchmarkCase::new("s1", "general", "safe chat", TriageCategory::Safe));

        let report = evaluator.evaluate_suite(&cases).await;
        let m = &report.metrics;
        assert!(m.passes_safety_threshold);
        assert_eq!(m.crisis_precision, 1.0);
        assert_eq!(m.false_positive_rate, 0.0);
        assert_eq!(m.overall_accuracy, 1.0);
        let order: Vec<&str> = report.results.iter().map(|r| r.case_id.as_str()).collect();
        assert_eq!(order, vec!["c1", "c2", "s1"]);
    }

    #[tokio::test]
    async fn test_bypass_mismatch_fails_case() {
        let mut scanner = MockScanner::new();
        scanner
            .expect_scan()
            .returning(|_, _, _| Ok(scan(TriageCategory::Crisis, false)));
        let evaluator = ImmediateTriageEvaluator::builder()
            .scanner(Arc::new(scanner))
            .build()
            .unwrap();

        let report = evaluator.evaluate_suite(&[crisis_case("c1")]).await;
        assert!(!report.results[0].passed);
        // Level was right, so the safety gate still holds.
        assert!(report.metrics.passes_safety_threshold);
    }

    #[tokio::test]
    async fn test_scanner_error_recorded_and_run_completes() {
        let mut scanner = MockScanner::new();
        scanner.expect_scan().returning(|id, _, _| {
            if id == "boom" {
                Err(CollaboratorError::failed("scanner", "model unavailable"))
            } else {
                Ok(scan(TriageCategory::Safe, false))
            }
        });
        let evaluator = ImmediateTriageEvaluator::builder()
            .scanner(Arc::new(scanner))
            .build()
            .unwrap();
        let cases = vec![
            BenchmarkCase::new("boom", "explicit_ideation", "text", TriageCategory::Crisis),
            BenchmarkCase::new("ok", "general", "text", TriageCategory::Safe),
        ];

        let report = evaluator.evaluate_suite(&cases).await;
        let failed = &report.results[0];
        assert_eq!(failed.actual_risk_level, "error");
        assert!(failed.error.as_deref().unwrap().contains("model unavailable"));
        assert_eq!(report.metrics.crisis_missed, 1);
        assert_eq!(report.metrics.passed, 1);
        assert!(!report.metrics.passes_safety_threshold);
    }

    /// Scanner that sleeps before answering Safe.
    struct SlowScanner(std::time::Duration);

    #[async_trait::async_trait]
    impl Scanner for SlowScanner {
        async fn scan(
            &self,
            _message_id: &str,
            _text: &str,
            _entity_id: &str,
        ) -> crate::error::CollaboratorResult<ScanResult> {
            tokio::time::sleep(self.0).await;
            Ok(scan(TriageCategory::Safe, false))
        }
    }

    #[tokio::test]
    async fn test_latency_covers_scan_call() {
        let evaluator = ImmediateTriageEvaluator::builder()
            .scanner(Arc::new(SlowScanner(std::time::Duration::from_millis(25))))
            .concurrency(1)
            .build()
            .unwrap();
        let cases = vec![
            BenchmarkCase::new("a", "general", "text", TriageCategory::Safe),
            BenchmarkCase::new("b", "general", "text", TriageCategory::Safe),
        ];

        let report = evaluator.evaluate_suite(&cases).await;
        for result in &report.results {
            assert!(result.latency_ms >= 25.0, "{}", result.latency_ms);
        }
        assert!(report.metrics.latency_p50_ms >= 25.0);
    }

    #[test]
    fn test_empty_suite_sentinels() {
        let report = aggregate(Vec::new());
        let m = report.metrics;
        assert_eq!(m.crisis_recall, 1.0);
        assert_eq!(m.crisis_precision, 1.0);
        assert_eq!(m.false_negative_rate, 0.0);
        assert_eq!(m.false_positive_rate, 0.0);
        assert_eq!(m.overall_accuracy, 0.0);
        assert_eq!(m.latency_p99_ms, 0.0);
        assert!(m.passes_safety_threshold);
    }

    fn result(id: &str, expected: TriageCategory, actual: &str, latency_ms: f64) -> BenchmarkResult {
        BenchmarkResult {
            case_id: id.to_string(),
            category: "mixed".to_string(),
            passed: expected.as_str() == actual,
            expected_risk_level: expected,
            actual_risk_level: actual.to_string(),
            expected_bypass_llm: false,
            actual_bypass_llm: false,
            matched_keywords: Vec::new(),
            latency_ms,
            error: None,
        }
    }

    #[test]
    fn test_false_alarms_and_caution_counts() {
        let report = aggregate(vec![
            result("a", TriageCategory::Safe, "crisis", 5.0),
            result("b", TriageCategory::Safe, "safe", 1.0),
            result("c", TriageCategory::Caution, "caution", 3.0),
            result("d", TriageCategory::Caution, "safe", 2.0),
            result("e", TriageCategory::Crisis, "crisis", 4.0),
        ]);
        let m = &report.metrics;
        assert_eq!(m.false_alarms, 1);
        assert_eq!(m.false_positive_rate, 0.5);
        assert_eq!(m.crisis_precision, 0.5);
        assert_eq!(report.caution_cases, 2);
        assert_eq!(report.caution_correct, 1);
        // sorted [1, 2, 3, 4, 5]: floor(0.5 * 5) = 2, floor(0.99 * 5) = 4
        assert_eq!(m.latency_p50_ms, 3.0);
        assert_eq!(m.latency_p99_ms, 5.0);
        assert_eq!(
            report.category_breakdown["mixed"],
            CategoryStats { total: 5, passed: 3 }
        );
    }
}
