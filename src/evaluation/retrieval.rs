//! Ranking-quality metrics for vector store searches.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::stats::{ratio_or, round4};
use crate::store::VectorStore;

/// Characters of a document used as its generated query.
pub const GENERATED_QUERY_CHARS: usize = 100;

/// Same-entity neighbours added to a generated relevance set.
pub const GENERATED_NEIGHBOURS: usize = 3;

/// One retrieval query with ground-truth relevant documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalTestCase {
    /// Query text.
    pub query: String,
    /// Ids of documents that should be retrieved.
    pub relevant_doc_ids: Vec<String>,
    /// Restrict the search to one entity.
    #[serde(default)]
    pub entity_hash: Option<String>,
}

/// Ranking metrics, each rounded to 4 decimals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalMetrics {
    pub precision_at_1: f64,
    pub precision_at_3: f64,
    pub precision_at_5: f64,
    pub recall_at_5: f64,
    pub mrr: f64,
    pub ndcg_at_5: f64,
}

impl RetrievalMetrics {
    /// Metrics for one ranked list against a relevance set.
    pub fn compute(retrieved: &[String], relevant: &HashSet<String>) -> Self {
        Self {
            precision_at_1: precision_at_k(retrieved, relevant, 1),
            precision_at_3: precision_at_k(retrieved, relevant, 3),
            precision_at_5: precision_at_k(retrieved, relevant, 5),
            recall_at_5: recall_at_k(retrieved, relevant, 5),
            mrr: reciprocal_rank(retrieved, relevant),
            ndcg_at_5: ndcg_at_k(retrieved, relevant, 5),
        }
    }

    fn rounded(self) -> Self {
        Self {
            precision_at_1: round4(self.precision_at_1),
            precision_at_3: round4(self.precision_at_3),
            precision_at_5: round4(self.precision_at_5),
            recall_at_5: round4(self.recall_at_5),
            mrr: round4(self.mrr),
            ndcg_at_5: round4(self.ndcg_at_5),
        }
    }
}

/// Per-case outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalCaseResult {
    pub query: String,
    /// Retrieved ids in rank order.
    pub retrieved_ids: Vec<String>,
    pub metrics: RetrievalMetrics,
}

/// Suite outcome: averaged metrics plus every case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalReport {
    pub num_cases: usize,
    pub metrics: RetrievalMetrics,
    pub results: Vec<RetrievalCaseResult>,
}

// ============================================================================
// Metric functions
// ============================================================================

fn hits_in_top_k(retrieved: &[String], relevant: &HashSet<String>, k: usize) -> usize {
    retrieved
        .iter()
        .take(k)
        .filter(|id| relevant.contains(*id))
        .count()
}

/// Relevant hits in the first `k` divided by `k`. 0.0 when fewer than `k`
/// results were retrieved.
pub fn precision_at_k(retrieved: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    if k == 0 || retrieved.len() < k {
        return 0.0;
    }
    hits_in_top_k(retrieved, relevant, k) as f64 / k as f64
}

/// Relevant hits in the first `k` divided by the relevant count. 1.0 when
/// nothing is relevant.
pub fn recall_at_k(retrieved: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    ratio_or(
        hits_in_top_k(retrieved, relevant, k) as f64,
        relevant.len() as f64,
        1.0,
    )
}

/// Inverse rank of the first relevant result, 0.0 if none.
pub fn reciprocal_rank(retrieved: &[String], relevant: &HashSet<String>) -> f64 {
    retrieved
        .iter()
        .position(|id| relevant.contains(id))
        .map(|pos| 1.0 / (pos + 1) as f64)
        .unwrap_or(0.0)
}

fn discount(rank: usize) -> f64 {
    1.0 / ((rank + 1) as f64).log2()
}

/// Binary-relevance NDCG over the first `k` results. 0.0 when nothing is
/// relevant.
pub fn ndcg_at_k(retrieved: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    let dcg: f64 = retrieved
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, id)| relevant.contains(*id))
        .map(|(i, _)| discount(i + 1))
        .sum();

    let ideal: f64 = (1..=relevant.len().min(k)).map(discount).sum();
    ratio_or(dcg, ideal, 0.0)
}

// ============================================================================
// Evaluator
// ============================================================================

/// Runs retrieval test cases against a store.
#[derive(Debug, Clone)]
pub struct RetrievalEvaluator {
    store: Arc<VectorStore>,
    top_k: usize,
}

impl RetrievalEvaluator {
    /// Create an evaluator requesting `top_k` results per query.
    pub fn new(store: Arc<VectorStore>, top_k: usize) -> Self {
        Self { store, top_k }
    }

    /// Search for one case and score the ranking.
    pub fn evaluate_case(&self, case: &RetrievalTestCase) -> RetrievalCaseResult {
        let retrieved_ids: Vec<String> = self
            .store
            .search(&case.query, case.entity_hash.as_deref(), self.top_k, 0.0)
            .into_iter()
            .map(|r| r.document.id.clone())
            .collect();
        let relevant: HashSet<String> = case.relevant_doc_ids.iter().cloned().collect();
        let metrics = RetrievalMetrics::compute(&retrieved_ids, &relevant).rounded();

        debug!(
            retrieved = retrieved_ids.len(),
            relevant = relevant.len(),
            mrr = metrics.mrr,
            "Retrieval case evaluated"
        );

        RetrievalCaseResult {
            query: case.query.clone(),
            retrieved_ids,
            metrics,
        }
    }

    /// Evaluate every case and average each metric.
    pub fn evaluate_suite(&self, cases: &[RetrievalTestCase]) -> RetrievalReport {
        let results: Vec<RetrievalCaseResult> =
            cases.iter().map(|c| self.evaluate_case(c)).collect();

        let n = results.len().max(1) as f64;
        let avg = |f: fn(&RetrievalMetrics) -> f64| {
            results.iter().map(|r| f(&r.metrics)).sum::<f64>() / n
        };
        let metrics = RetrievalMetrics {
            precision_at_1: avg(|m| m.precision_at_1),
            precision_at_3: avg(|m| m.precision_at_3),
            precision_at_5: avg(|m| m.precision_at_5),
            recall_at_5: avg(|m| m.recall_at_5),
            mrr: avg(|m| m.mrr),
            ndcg_at_5: avg(|m| m.ndcg_at_5),
        }
        .rounded();

        info!(
            cases = results.len(),
            precision_at_1 = metrics.precision_at_1,
            mrr = metrics.mrr,
            ndcg_at_5 = metrics.ndcg_at_5,
            "Retrieval evaluation complete"
        );

        RetrievalReport {
            num_cases: results.len(),
            metrics,
            results,
        }
    }

    /// Derive up to `max_cases` test cases from stored documents.
    ///
    /// The query is the first 100 characters of a document; relevant ids
    /// are the document itself plus up to 3 other documents of its entity.
    pub fn generate_test_cases(&self, max_cases: usize) -> Vec<RetrievalTestCase> {
        self.store
            .documents()
            .into_iter()
            .take(max_cases)
            .map(|doc| {
                let mut relevant_doc_ids = vec![doc.id.clone()];
                if let Some(entity) = doc.entity_hash() {
                    relevant_doc_ids.extend(
                        self.store
                            .get_entity_history(entity, usize::MAX)
                            .into_iter()
                            .filter(|other| other.id != doc.id)
                            .take(GENERATED_NEIGHBOURS)
                            .map(|other| other.id.clone()),
                    );
                }
                RetrievalTestCase {
                    query: doc.content.chars().take(GENERATED_QUERY_CHARS).collect(),
                    relevant_doc_ids,
                    entity_hash: None,
                }
            })
            .collect()
    }
}
