//! Benchmark cases and suite loading.
//!
//! A suite file is either a JSON array of cases or an object
//! `{"name": "...", "cases": [...]}`. A missing file is a configuration
//! error and stops the load. A malformed record is rejected on its own,
//! logged and kept in [`BenchmarkSuite::rejected`]; the rest still load.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AppResult, DataError, DataResult};
use crate::evaluation::SessionTrajectory;
use crate::triage::TriageCategory;

/// Inclusive `[min, max]` questionnaire score range, written as a 2-element array.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreRange(pub u32, pub u32);

impl ScoreRange {
    /// Lower bound.
    pub fn min(&self) -> u32 {
        self.0
    }

    /// Upper bound.
    pub fn max(&self) -> u32 {
        self.1
    }

    /// True if `score` lies within the range.
    pub fn contains(&self, score: u32) -> bool {
        (self.0..=self.1).contains(&score)
    }

    /// Midpoint of the range.
    pub fn midpoint(&self) -> f64 {
        (f64::from(self.0) + f64::from(self.1)) / 2.0
    }
}

/// One labeled benchmark case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkCase {
    /// Unique case identifier.
    pub case_id: String,
    /// Free-text category label (e.g. "explicit_ideation").
    pub category: String,
    /// Message under test. For session cases, the final message.
    pub input_text: String,
    /// Expected risk level.
    pub expected_risk_level: TriageCategory,
    /// Whether the crisis bypass should fire.
    #[serde(default)]
    pub expected_bypass_llm: bool,
    /// Keywords the scanner is expected to match.
    #[serde(default)]
    pub expected_keywords: Vec<String>,
    /// Earlier messages of the same session, oldest first.
    #[serde(default)]
    pub session_context: Vec<String>,
    /// Marker item ids expected somewhere in the session.
    #[serde(default)]
    pub expected_markers: Vec<String>,
    /// Expected accumulated PHQ-9 range.
    #[serde(default)]
    pub expected_phq9_range: Option<ScoreRange>,
    /// Expected accumulated GAD-7 range.
    #[serde(default)]
    pub expected_gad7_range: Option<ScoreRange>,
    /// Expected session trajectory, when the case pins one.
    #[serde(default)]
    pub expected_trajectory: Option<SessionTrajectory>,
}

impl BenchmarkCase {
    /// Create a single-message case.
    pub fn new(
        case_id: impl Into<String>,
        category: impl Into<String>,
        input_text: impl Into<String>,
        expected_risk_level: TriageCategory,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            category: category.into(),
            input_text: input_text.into(),
            expected_risk_level,
            expected_bypass_llm: false,
            expected_keywords: Vec::new(),
            session_context: Vec::new(),
            expected_markers: Vec::new(),
            expected_phq9_range: None,
            expected_gad7_range: None,
            expected_trajectory: None,
        }
    }

    /// Set the expected bypass flag.
    pub fn with_bypass(mut self, bypass: bool) -> Self {
        self.expected_bypass_llm = bypass;
        self
    }

    /// Set the earlier session messages.
    pub fn with_session_context(mut self, context: Vec<String>) -> Self {
        self.session_context = context;
        self
    }

    /// Set the expected marker ids.
    pub fn with_expected_markers(mut self, markers: Vec<String>) -> Self {
        self.expected_markers = markers;
        self
    }

    /// Set the expected PHQ-9 range.
    pub fn with_phq9_range(mut self, min: u32, max: u32) -> Self {
        self.expected_phq9_range = Some(ScoreRange(min, max));
        self
    }

    /// Set the expected GAD-7 range.
    pub fn with_gad7_range(mut self, min: u32, max: u32) -> Self {
        self.expected_gad7_range = Some(ScoreRange(min, max));
        self
    }

    /// Set the expected trajectory.
    pub fn with_expected_trajectory(mut self, trajectory: SessionTrajectory) -> Self {
        self.expected_trajectory = Some(trajectory);
        self
    }

    /// Every message of the session in order: context first, input last.
    pub fn messages(&self) -> Vec<&str> {
        self.session_context
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.input_text.as_str()))
            .collect()
    }

    /// Check required fields and range sanity.
    pub fn validate(&self) -> DataResult<()> {
        if self.case_id.trim().is_empty() {
            return Err(DataError::MissingField {
                field: "case_id".to_string(),
            });
        }
        if self.input_text.trim().is_empty() {
            return Err(DataError::MissingField {
                field: "input_text".to_string(),
            });
        }
        for (field, range) in [
            ("expected_phq9_range", self.expected_phq9_range),
            ("expected_gad7_range", self.expected_gad7_range),
        ] {
            if let Some(r) = range {
                if r.min() > r.max() {
                    return Err(DataError::UnknownValue {
                        field: field.to_string(),
                        value: format!("[{}, {}]", r.min(), r.max()),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A loaded suite and the records that failed to load.
#[derive(Debug, Default)]
pub struct BenchmarkSuite {
    /// Suite name (file stem unless the file names itself).
    pub name: String,
    /// Cases that loaded cleanly, in file order.
    pub cases: Vec<BenchmarkCase>,
    /// Per-record failures.
    pub rejected: Vec<DataError>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SuiteFile {
    Named {
        name: Option<String>,
        cases: Vec<serde_json::Value>,
    },
    Bare(Vec<serde_json::Value>),
}

impl BenchmarkSuite {
    /// Parse a suite from JSON text.
    pub fn from_json_str(default_name: &str, json: &str) -> DataResult<Self> {
        let (name, records) = match serde_json::from_str::<SuiteFile>(json)? {
            SuiteFile::Named { name, cases } => {
                (name.unwrap_or_else(|| default_name.to_string()), cases)
            }
            SuiteFile::Bare(cases) => (default_name.to_string(), cases),
        };

        let mut suite = BenchmarkSuite {
            name,
            ..Default::default()
        };

        for (index, record) in records.into_iter().enumerate() {
            match parse_case(index, record) {
                Ok(case) => suite.cases.push(case),
                Err(e) => {
                    warn!(suite = %suite.name, index = index, error = %e, "Rejected benchmark record");
                    suite.rejected.push(e);
                }
            }
        }

        Ok(suite)
    }
}

fn parse_case(index: usize, record: serde_json::Value) -> DataResult<BenchmarkCase> {
    let case: BenchmarkCase =
        serde_json::from_value(record).map_err(|e| DataError::InvalidRecord {
            index,
            message: e.to_string(),
        })?;
    case.validate()?;
    Ok(case)
}

/// Load a benchmark suite from a JSON file.
pub fn load_suite(path: impl AsRef<Path>) -> AppResult<BenchmarkSuite> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AppError::Config {
            message: format!("benchmark file not found: {}", path.display()),
        });
    }

    let text = std::fs::read_to_string(path).map_err(|e| AppError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let default_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("benchmark");
    let suite = BenchmarkSuite::from_json_str(default_name, &text)?;

    info!(
        suite = %suite.name,
        path = %path.display(),
        loaded = suite.cases.len(),
        rejected = suite.rejected.len(),
        "Benchmark suite loaded"
    );
    Ok(suite)
}
