use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub analysis: AnalysisConfig,
    pub evaluation: EvaluationConfig,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Fixed embedding dimension for every document in a store instance.
    pub embedding_dim: usize,
}

/// Pattern analysis configuration
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Default number of sessions pulled into a context window.
    pub max_sessions: usize,
}

/// Benchmark evaluation configuration
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Results requested from the store per retrieval test case.
    pub search_top_k: usize,
    /// Cases evaluated concurrently. Always at least 1.
    pub concurrency: usize,
    /// Entity id handed to the Scanner for single-message cases.
    pub placeholder_entity: String,
    /// Directory searched for benchmark suites by the CLI.
    pub benchmark_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { embedding_dim: 384 }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { max_sessions: 10 }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            search_top_k: 10,
            concurrency: 4,
            placeholder_entity: "benchmark-student".to_string(),
            benchmark_dir: PathBuf::from("./benchmarks"),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let store = StoreConfig {
            embedding_dim: parse_var("TRIAGE_EMBEDDING_DIM", 384),
        };
        if store.embedding_dim == 0 {
            return Err(AppError::Config {
                message: "TRIAGE_EMBEDDING_DIM must be greater than zero".to_string(),
            });
        }

        let analysis = AnalysisConfig {
            max_sessions: parse_var("TRIAGE_MAX_SESSIONS", 10),
        };

        let evaluation = EvaluationConfig {
            search_top_k: parse_var("TRIAGE_SEARCH_TOP_K", 10),
            concurrency: parse_var("TRIAGE_EVAL_CONCURRENCY", 4usize).max(1),
            placeholder_entity: env::var("TRIAGE_PLACEHOLDER_ENTITY")
                .unwrap_or_else(|_| "benchmark-student".to_string()),
            benchmark_dir: PathBuf::from(
                env::var("TRIAGE_BENCHMARK_DIR").unwrap_or_else(|_| "./benchmarks".to_string()),
            ),
        };

        Ok(Config {
            logging,
            store,
            analysis,
            evaluation,
        })
    }
}
