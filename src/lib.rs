//! # Triage Eval
//!
//! Clinical risk triage and its evaluation harness. Free-text input is
//! classified into Safe / Caution / Crisis over three horizons: a single
//! message, a multi-turn session and a student's longitudinal history.
//!
//! ## Features
//!
//! - **Category mapping**: PHQ-9 / GAD-7 totals, category strings and
//!   clinical decisions to a triage category, with crisis keyword override
//! - **Vector store**: in-memory, per-student partitioned similarity search
//! - **Pattern analysis**: escalating, chronic, cyclical, acute, improving or
//!   stable trajectories across sessions
//! - **Evaluation**: retrieval ranking metrics, the single-message crisis
//!   safety gate, and session trajectory / counselor-flag accuracy
//!
//! ## Architecture
//!
//! ```text
//! text / scores → CategoryMapper → TriageCategory
//!
//! sessions → VectorStore → PatternAnalyzer → PatternMatch
//!
//! BenchmarkCase → Scanner / Analyzer + MarkerDetector → Evaluators → metrics
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use triage_eval::benchmark::load_suite;
//! use triage_eval::collaborators::KeywordScanner;
//! use triage_eval::evaluation::ImmediateTriageEvaluator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let suite = load_suite("benchmarks/immediate.json")?;
//!     let evaluator = ImmediateTriageEvaluator::builder()
//!         .scanner(Arc::new(KeywordScanner::new()))
//!         .build()?;
//!     let report = evaluator.evaluate_suite(&suite.cases).await;
//!     assert!(report.metrics.passes_safety_threshold);
//!     Ok(())
//! }
//! ```

/// Benchmark case model and suite loading.
pub mod benchmark;
/// CLI commands for the `triage-eval` binary.
pub mod cli;
/// Scanner, Analyzer and MarkerDetector capability traits.
pub mod collaborators;
/// Configuration management.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// Retrieval, immediate and session evaluators.
pub mod evaluation;
/// Longitudinal risk pattern detection.
pub mod patterns;
/// Shared numeric helpers.
pub mod stats;
/// In-memory vector store.
pub mod store;
/// Seeded synthetic session histories.
pub mod synthetic;
/// Triage categories, thresholds and the category mapper.
pub mod triage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use triage::{CategoryMapper, TriageCategory};
