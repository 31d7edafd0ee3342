//! Keyword reference scanner.

use async_trait::async_trait;

use super::{ScanResult, Scanner};
use crate::error::CollaboratorResult;
use crate::triage::{CategoryMapper, TriageCategory};

/// Deterministic scanner backed by the [`CategoryMapper`] tables.
///
/// A crisis keyword yields Crisis with the bypass flag set. Otherwise the
/// text is resolved as a clinical category and its default triage is used.
#[derive(Debug, Clone, Default)]
pub struct KeywordScanner {
    mapper: CategoryMapper,
}

impl KeywordScanner {
    /// Create a new keyword scanner.
    pub fn new() -> Self {
        Self::default()
    }

    fn score_for(level: TriageCategory) -> f64 {
        match level {
            TriageCategory::Crisis => 0.95,
            TriageCategory::Caution => 0.5,
            TriageCategory::Safe => 0.1,
        }
    }
}

#[async_trait]
impl Scanner for KeywordScanner {
    async fn scan(
        &self,
        _message_id: &str,
        text: &str,
        _entity_id: &str,
    ) -> CollaboratorResult<ScanResult> {
        let matched = self.mapper.matched_crisis_keywords(text);
        if !matched.is_empty() {
            return Ok(ScanResult {
                risk_level: TriageCategory::Crisis,
                bypass_llm: true,
                risk_score: Self::score_for(TriageCategory::Crisis),
                matched_keywords: matched.into_iter().map(String::from).collect(),
            });
        }

        let level = self.mapper.resolve_category(text).default_triage();
        Ok(ScanResult {
            risk_level: level,
            bypass_llm: false,
            risk_score: Self::score_for(level),
            matched_keywords: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crisis_keyword_bypasses() {
        let scanner = KeywordScanner::new();
        let result = scanner
            .scan("m1", "I just want to end it all tonight", "stu")
            .await
            .unwrap();
        assert_eq!(result.risk_level, TriageCategory::Crisis);
        assert!(result.bypass_llm);
        assert_eq!(result.matched_keywords, vec!["end it all".to_string()]);
    }

    #[tokio::test]
    async fn test_category_text_without_keywords() {
        let scanner = KeywordScanner::new();
        let result = scanner
            .scan("m2", "My anxiety before presentations is getting worse", "stu")
            .await
            .unwrap();
        assert_eq!(result.risk_level, TriageCategory::Caution);
        assert!(!result.bypass_llm);

        let result = scanner
            .scan("m3", "Had a good week overall", "stu")
            .await
            .unwrap();
        assert_eq!(result.risk_level, TriageCategory::Safe);
    }
}
