//! Unit tests for the vector store.
//!
//! Covers insertion, partitioning, search ordering and limits, history
//! ordering and clearing.

use super::*;
use chrono::{Duration, TimeZone};
use serde_json::json;

fn meta(entity: &str, session: &str, risk: f64) -> Metadata {
    let mut m = Metadata::new();
    m.insert(ENTITY_HASH_KEY.to_string(), json!(entity));
    m.insert(SESSION_ID_KEY.to_string(), json!(session));
    m.insert(RISK_SCORE_KEY.to_string(), json!(risk));
    m
}

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap() + Duration::days(n)
}

// ============================================================================
// Insertion tests
// ============================================================================

#[test]
fn test_add_document_assigns_id_and_embeds() {
    let store = VectorStore::new(32);
    let doc = store
        .add_document("Felt anxious before exams", meta("s1", "sess-1", 0.4), None)
        .unwrap();

    assert!(doc.id.starts_with("doc_"));
    assert_eq!(doc.embedding.len(), 32);
    assert_eq!(doc.embedding, store.embed("Felt anxious before exams"));
    assert_eq!(doc.entity_hash(), Some("s1"));
    assert_eq!(doc.session_id(), Some("sess-1"));
    assert_eq!(doc.risk_score(), Some(0.4));
    assert_eq!(store.len(), 1);
    assert_eq!(store.entity_count(), 1);
}

#[test]
fn test_identical_inserts_get_distinct_ids() {
    let store = VectorStore::new(16);
    let a = store
        .add_document("same text", meta("s1", "sess-1", 0.2), None)
        .unwrap();
    let b = store
        .add_document("same text", meta("s1", "sess-1", 0.2), None)
        .unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(store.get_document(&a.id).unwrap().id, a.id);
    assert_eq!(store.get_document(&b.id).unwrap().id, b.id);
    assert_eq!(store.get_entity_history("s1", 10).len(), 2);
}

#[test]
fn test_supplied_embedding_is_kept() {
    let store = VectorStore::new(3);
    let doc = store
        .add_document("manual", Metadata::new(), Some(vec![0.1, 0.2, 0.3]))
        .unwrap();
    assert_eq!(doc.embedding, vec![0.1, 0.2, 0.3]);
}

#[test]
fn test_wrong_dimension_is_rejected_and_not_indexed() {
    let store = VectorStore::new(4);
    let err = store
        .add_document("bad", meta("s1", "sess-1", 0.1), Some(vec![1.0, 2.0]))
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::DimensionMismatch {
            expected: 4,
            actual: 2
        }
    ));
    assert!(store.is_empty());
    assert!(store.get_entity_history("s1", 10).is_empty());
}

#[test]
fn test_empty_content_is_stored() {
    let store = VectorStore::new(8);
    let empty = store.add_document("", meta("s1", "sess-1", 0.1), None).unwrap();
    let blank = store
        .add_document("   ", meta("s1", "sess-2", 0.2), Some(vec![1.0; 8]))
        .unwrap();

    assert_eq!(empty.embedding, store.embed(""));
    assert_eq!(blank.embedding, vec![1.0; 8]);
    assert_eq!(store.get_document(&empty.id).unwrap().content, "");
    assert_eq!(store.get_document(&blank.id).unwrap().content, "   ");
    assert_eq!(store.get_entity_history("s1", 10).len(), 2);

    let results = store.search("", Some("s1"), 1, 0.0);
    assert_eq!(results[0].document.id, empty.id);
}

#[test]
fn test_document_without_entity_is_global_only() {
    let store = VectorStore::new(8);
    let doc = store
        .add_document("orphan note", Metadata::new(), None)
        .unwrap();

    assert_eq!(store.entity_count(), 0);
    let results = store.search("orphan note", None, 5, 0.0);
    assert_eq!(results[0].document.id, doc.id);
}

// ============================================================================
// Search tests
// ============================================================================

#[test]
fn test_search_exact_match_ranks_first() {
    let store = VectorStore::new(32);
    store
        .add_document("talked about sleep", meta("s1", "a", 0.2), None)
        .unwrap();
    let target = store
        .add_document("talked about exams", meta("s1", "b", 0.3), None)
        .unwrap();
    store
        .add_document("talked about family", meta("s2", "c", 0.4), None)
        .unwrap();

    let results = store.search("talked about exams", None, 3, 0.0);
    assert_eq!(results[0].document.id, target.id);
    assert!((results[0].similarity - 1.0).abs() < 1e-9);
    assert_eq!(results[0].rank, 1);
}

#[test]
fn test_search_respects_top_k_and_ordering() {
    let store = VectorStore::new(32);
    for i in 0..10 {
        store
            .add_document(&format!("session note {}", i), meta("s1", "x", 0.1), None)
            .unwrap();
    }

    let results = store.search("session note", None, 4, 0.0);
    assert_eq!(results.len(), 4);
    for pair in results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
    let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);

    assert!(store.search("session note", None, 0, 0.0).is_empty());
}

#[test]
fn test_search_entity_filter() {
    let store = VectorStore::new(32);
    store
        .add_document("note one", meta("s1", "a", 0.1), None)
        .unwrap();
    store
        .add_document("note two", meta("s2", "b", 0.1), None)
        .unwrap();
    store
        .add_document("note three", meta("s2", "c", 0.1), None)
        .unwrap();

    let results = store.search("note", Some("s2"), 10, -1.0);
    assert_eq!(results.len(), 2);
    assert!(results
        .iter()
        .all(|r| r.document.entity_hash() == Some("s2")));

    assert!(store.search("note", Some("nobody"), 10, -1.0).is_empty());
}

#[test]
fn test_search_min_similarity_filters() {
    let store = VectorStore::new(3);
    store
        .add_document("a", Metadata::new(), Some(vec![1.0, 0.0, 0.0]))
        .unwrap();
    store
        .add_document("b", Metadata::new(), Some(vec![0.0, 1.0, 0.0]))
        .unwrap();

    let results = store.search_by_embedding(&[1.0, 0.0, 0.0], None, 10, 0.5);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.content, "a");
}

#[test]
fn test_search_ties_keep_insertion_order() {
    let store = VectorStore::new(2);
    let first = store
        .add_document("first", Metadata::new(), Some(vec![1.0, 1.0]))
        .unwrap();
    let second = store
        .add_document("second", Metadata::new(), Some(vec![1.0, 1.0]))
        .unwrap();

    let results = store.search_by_embedding(&[1.0, 1.0], None, 2, 0.0);
    assert_eq!(results[0].document.id, first.id);
    assert_eq!(results[1].document.id, second.id);
}

// ============================================================================
// History tests
// ============================================================================

#[test]
fn test_entity_history_sorted_by_created_at() {
    let store = VectorStore::new(8);
    store
        .add_document_at("third", meta("s1", "c", 0.3), None, day(3))
        .unwrap();
    store
        .add_document_at("first", meta("s1", "a", 0.1), None, day(1))
        .unwrap();
    store
        .add_document_at("second", meta("s1", "b", 0.2), None, day(2))
        .unwrap();

    let history = store.get_entity_history("s1", 10);
    let contents: Vec<&str> = history.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);

    let limited = store.get_entity_history("s1", 2);
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].content, "first");
}

#[test]
fn test_clear_drops_everything() {
    let store = VectorStore::new(8);
    let doc = store
        .add_document("note", meta("s1", "a", 0.1), None)
        .unwrap();
    store.clear();

    assert!(store.is_empty());
    assert_eq!(store.entity_count(), 0);
    assert!(store.get_document(&doc.id).is_none());
    assert!(store.get_entity_history("s1", 10).is_empty());
    assert!(store.search("note", None, 5, 0.0).is_empty());
}

#[test]
fn test_entity_hashes_sorted() {
    let store = VectorStore::new(8);
    store.add_document("x", meta("zeta", "a", 0.1), None).unwrap();
    store.add_document("y", meta("alpha", "b", 0.1), None).unwrap();
    assert_eq!(store.entity_hashes(), vec!["alpha", "zeta"]);
}

#[test]
fn test_concurrent_readers_see_whole_documents() {
    let store = Arc::new(VectorStore::new(16));
    let writer = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            for i in 0..50 {
                store
                    .add_document(&format!("note {}", i), meta("s1", "a", 0.1), None)
                    .unwrap();
            }
        })
    };

    for _ in 0..50 {
        let history = store.get_entity_history("s1", 100);
        for doc in history {
            assert!(store.get_document(&doc.id).is_some());
        }
    }
    writer.join().unwrap();
    assert_eq!(store.len(), 50);
}
