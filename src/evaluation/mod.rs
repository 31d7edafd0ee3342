//! Benchmark evaluators.
//!
//! - [`RetrievalEvaluator`]: ranking quality of [`VectorStore`](crate::store::VectorStore) searches
//! - [`ImmediateTriageEvaluator`]: single-message cases through a [`Scanner`](crate::collaborators::Scanner)
//! - [`SessionTriageEvaluator`]: multi-message cases through an
//!   [`Analyzer`](crate::collaborators::Analyzer) and
//!   [`MarkerDetector`](crate::collaborators::MarkerDetector)
//!
//! A collaborator failure on one case becomes a failed result for that case;
//! a run always completes. Zero denominators resolve to fixed sentinel
//! values documented on each metric.

mod immediate;
mod retrieval;
mod session;

pub use immediate::*;
pub use retrieval::*;
pub use session::*;

/// Actual-level label recorded when a collaborator call fails.
pub const ERROR_LEVEL: &str = "error";
