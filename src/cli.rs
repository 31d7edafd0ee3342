//! CLI commands for the `triage-eval` binary.
//!
//! Quick classification lookups plus benchmark runs against synthetic data
//! or a JSON suite with the keyword reference scanner.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::benchmark::load_suite;
use crate::collaborators::KeywordScanner;
use crate::config::Config;
use crate::evaluation::{ImmediateTriageEvaluatorBuilder, RetrievalEvaluator};
use crate::patterns::PatternAnalyzer;
use crate::store::VectorStore;
use crate::synthetic::{SyntheticGenerator, SyntheticStudent};
use crate::triage::{CategoryMapper, ClinicalThresholds};

const RULE: &str =
    "═══════════════════════════════════════════════════════════════════════════════\n";

/// Triage evaluation subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Map a PHQ-9 total to a triage category
    Phq9 {
        /// PHQ-9 total score (0-27)
        total: u32,

        /// Item 9 (self-harm ideation) sub-score
        #[arg(long)]
        item9: Option<u32>,
    },

    /// Map a GAD-7 total to a triage category
    Gad7 {
        /// GAD-7 total score (0-21)
        total: u32,
    },

    /// Map a category string to a triage category
    Category {
        /// Free-text category (e.g. "anxiety", "self-harm")
        category: String,

        /// Message text scanned for crisis keywords
        #[arg(long)]
        text: Option<String>,

        /// Severity score in [0, 1]
        #[arg(long)]
        severity: Option<f64>,
    },

    /// Map a clinical decision type to a triage category
    Decision {
        /// Decision type (e.g. "refer", "routine check-in")
        decision_type: String,

        /// Urgency hint (high, medium, ...)
        #[arg(long)]
        urgency: Option<String>,
    },

    /// Evaluate retrieval quality on a synthetic store
    Retrieval {
        /// Random seed for the synthetic histories
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Maximum generated test cases
        #[arg(long, default_value = "50")]
        max_cases: usize,
    },

    /// Classify risk patterns of synthetic students
    Patterns {
        /// Random seed for the synthetic histories
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Sessions per synthetic student (4-10)
        #[arg(long, default_value = "6")]
        sessions: usize,
    },

    /// Run an immediate-triage suite with the keyword scanner
    Immediate {
        /// Suite file (absolute, or relative to the benchmark directory)
        #[arg(long)]
        file: PathBuf,
    },

    /// Load a suite and report rejected records
    Validate {
        /// Suite file (absolute, or relative to the benchmark directory)
        #[arg(long)]
        file: PathBuf,
    },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands, config: &Config) -> CliResult {
    match command {
        Commands::Phq9 { total, item9 } => execute_phq9(total, item9),
        Commands::Gad7 { total } => execute_gad7(total),
        Commands::Category {
            category,
            text,
            severity,
        } => execute_category(&category, text.as_deref(), severity),
        Commands::Decision {
            decision_type,
            urgency,
        } => execute_decision(&decision_type, urgency.as_deref()),
        Commands::Retrieval { seed, max_cases } => execute_retrieval(config, seed, max_cases),
        Commands::Patterns { seed, sessions } => execute_patterns(config, seed, sessions),
        Commands::Immediate { file } => execute_immediate(config, &file).await,
        Commands::Validate { file } => execute_validate(config, &file),
    }
}

fn execute_phq9(total: u32, item9: Option<u32>) -> CliResult {
    let triage = CategoryMapper::new().map_phq9_to_triage(total, item9);
    CliResult::success(format!(
        "PHQ-9 {} ({}): {}",
        total,
        ClinicalThresholds::phq9_severity(total),
        triage
    ))
}

fn execute_gad7(total: u32) -> CliResult {
    let triage = CategoryMapper::new().map_gad7_to_triage(total);
    CliResult::success(format!(
        "GAD-7 {} ({}): {}",
        total,
        ClinicalThresholds::gad7_severity(total),
        triage
    ))
}

fn execute_category(category: &str, text: Option<&str>, severity: Option<f64>) -> CliResult {
    let mapper = CategoryMapper::new();
    let clinical = mapper.resolve_category(category);
    let triage = mapper.map_category_to_triage(category, text, severity);
    CliResult::success(format!(
        "{} -> {} (default {}): {}",
        category,
        clinical.as_str(),
        clinical.default_triage(),
        triage
    ))
}

fn execute_decision(decision_type: &str, urgency: Option<&str>) -> CliResult {
    let triage = CategoryMapper::new().map_clinical_decision(decision_type, urgency);
    CliResult::success(format!("{}: {}", decision_type, triage))
}

fn synthetic_store(
    config: &Config,
    seed: u64,
    generator: &SyntheticGenerator,
) -> Result<(Arc<VectorStore>, Vec<SyntheticStudent>), CliResult> {
    let store = Arc::new(VectorStore::new(config.store.embedding_dim));
    let mut rng = StdRng::seed_from_u64(seed);
    let students = generator
        .populate(&store, &mut rng)
        .map_err(|e| CliResult::error(format!("Failed to build synthetic store: {}", e)))?;
    Ok((store, students))
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

fn execute_retrieval(config: &Config, seed: u64, max_cases: usize) -> CliResult {
    let (store, _) = match synthetic_store(config, seed, &SyntheticGenerator::new()) {
        Ok(built) => built,
        Err(e) => return e,
    };
    let evaluator = RetrievalEvaluator::new(store, config.evaluation.search_top_k);
    let cases = evaluator.generate_test_cases(max_cases);
    let report = evaluator.evaluate_suite(&cases);

    let mut output = String::new();
    output.push_str("\nRetrieval Evaluation\n");
    output.push_str(RULE);
    output.push_str(&format!("Cases: {}\n", report.num_cases));
    output.push_str(&to_json(&report.metrics));
    output.push('\n');
    CliResult::success(output)
}

fn execute_patterns(config: &Config, seed: u64, sessions: usize) -> CliResult {
    let generator = SyntheticGenerator::new().with_sessions_per_student(sessions);
    let (store, students) = match synthetic_store(config, seed, &generator) {
        Ok(built) => built,
        Err(e) => return e,
    };
    let analyzer = PatternAnalyzer::new(store);

    let mut output = String::new();
    output.push_str("\nRisk Patterns\n");
    output.push_str(RULE);
    let mut correct = 0;
    for student in &students {
        let result = analyzer.analyze_entity(&student.entity_hash, None, config.analysis.max_sessions);
        let marker = if result.pattern == student.pattern {
            correct += 1;
            "✓"
        } else {
            "✗"
        };
        output.push_str(&format!(
            "  {} {} expected={} detected={} confidence={:.2}\n    {}\n",
            marker,
            student.entity_hash,
            student.pattern,
            result.pattern,
            result.confidence,
            result.recommendation
        ));
    }
    output.push_str(&format!("\nDetected {}/{} patterns\n", correct, students.len()));
    CliResult::success(output)
}

/// The path as given if it exists, otherwise under the benchmark directory.
fn resolve_suite_path(config: &Config, file: &Path) -> PathBuf {
    if file.exists() || file.is_absolute() {
        file.to_path_buf()
    } else {
        config.evaluation.benchmark_dir.join(file)
    }
}

async fn execute_immediate(config: &Config, file: &Path) -> CliResult {
    let suite = match load_suite(resolve_suite_path(config, file)) {
        Ok(s) => s,
        Err(e) => return CliResult::error(format!("Failed to load suite: {}", e)),
    };
    let evaluator = match ImmediateTriageEvaluatorBuilder::from_config(&config.evaluation)
        .scanner(Arc::new(KeywordScanner::new()))
        .build()
    {
        Ok(e) => e,
        Err(e) => return CliResult::error(e.to_string()),
    };

    let report = evaluator.evaluate_suite(&suite.cases).await;

    let mut output = String::new();
    output.push_str(&format!("\nImmediate Triage: {}\n", suite.name));
    output.push_str(RULE);
    output.push_str(&to_json(&report.metrics));
    output.push('\n');
    if !suite.rejected.is_empty() {
        output.push_str(&format!("Rejected records: {}\n", suite.rejected.len()));
    }
    for case_id in &report.false_negatives {
        output.push_str(&format!("  [MISSED CRISIS] {}\n", case_id));
    }

    if report.metrics.passes_safety_threshold {
        output.push_str("\nSafety threshold: PASS ✓\n");
        CliResult::success(output)
    } else {
        output.push_str("\nSafety threshold: FAIL ⚠\n");
        CliResult::error(output)
    }
}

fn execute_validate(config: &Config, file: &Path) -> CliResult {
    let suite = match load_suite(resolve_suite_path(config, file)) {
        Ok(s) => s,
        Err(e) => return CliResult::error(format!("Failed to load suite: {}", e)),
    };

    let mut output = format!(
        "{}: {} cases loaded, {} rejected\n",
        suite.name,
        suite.cases.len(),
        suite.rejected.len()
    );
    for error in &suite.rejected {
        output.push_str(&format!("  - {}\n", error));
    }

    if suite.rejected.is_empty() {
        CliResult::success(output)
    } else {
        CliResult::error(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_phq9_command() {
        let config = Config::default();
        let result = execute_command(
            Commands::Phq9 {
                total: 2,
                item9: Some(1),
            },
            &config,
        )
        .await;
        assert_eq!(result.exit_code, 0);
        assert!(result.message.ends_with("crisis"));
    }

    #[tokio::test]
    async fn test_immediate_command_gate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.json");
        std::fs::write(
            &path,
            r#"[
                {"case_id":"c1","category":"ideation","input_text":"I want to end it all","expected_risk_level":"crisis","expected_bypass_llm":true},
                {"case_id":"s1","category":"general","input_text":"Had a good week","expected_risk_level":"safe"}
            ]"#,
        )
        .unwrap();

        let config = Config::default();
        let result = execute_command(Commands::Immediate { file: path.clone() }, &config).await;
        assert_eq!(result.exit_code, 0, "{}", result.message);
        assert!(result.message.contains("\"crisis_recall\": 1.0"));
    }

    #[tokio::test]
    async fn test_validate_missing_file() {
        let config = Config::default();
        let result = execute_command(
            Commands::Validate {
                file: PathBuf::from("/no/such/suite.json"),
            },
            &config,
        )
        .await;
        assert_eq!(result.exit_code, 1);
        assert!(result.message.contains("not found"));
    }

    #[tokio::test]
    async fn test_patterns_command_detects_all() {
        let config = Config::default();
        let result = execute_command(
            Commands::Patterns {
                seed: 7,
                sessions: 6,
            },
            &config,
        )
        .await;
        assert_eq!(result.exit_code, 0);
        assert!(result.message.contains("Detected 12/12 patterns"), "{}", result.message);
    }
}
