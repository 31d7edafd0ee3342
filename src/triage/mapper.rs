//! Deterministic mapping from scores, categories and decisions to triage.
//!
//! Every function here is pure. Free-text dispatch goes through ordered
//! `(pattern, value)` tables where the first match wins, so table order is
//! part of the behaviour.

use tracing::debug;

use super::{ClinicalCategory, TriageCategory};

// ============================================================================
// Rule Tables
// ============================================================================

/// Phrases that force Crisis whenever they appear in free text.
pub const CRISIS_KEYWORDS: &[&str] = &[
    "suicide",
    "suicidal",
    "kill myself",
    "killing myself",
    "end my life",
    "ending my life",
    "want to die",
    "wanna die",
    "better off dead",
    "no reason to live",
    "end it all",
    "self-harm",
    "self harm",
    "hurt myself",
    "hurting myself",
    "cut myself",
    "cutting myself",
    "overdose",
];

/// Category substrings, checked in order.
pub const CATEGORY_PATTERNS: &[(&str, ClinicalCategory)] = &[
    ("suicid", ClinicalCategory::SuicidalIdeation),
    ("self-harm", ClinicalCategory::SelfHarm),
    ("self harm", ClinicalCategory::SelfHarm),
    ("selfharm", ClinicalCategory::SelfHarm),
    ("depress", ClinicalCategory::Depression),
    ("anxi", ClinicalCategory::Anxiety),
    ("panic", ClinicalCategory::Anxiety),
    ("trauma", ClinicalCategory::Trauma),
    ("ptsd", ClinicalCategory::Trauma),
    ("substance", ClinicalCategory::SubstanceUse),
    ("alcohol", ClinicalCategory::SubstanceUse),
    ("drug", ClinicalCategory::SubstanceUse),
    ("eating", ClinicalCategory::EatingDisorder),
    ("stress", ClinicalCategory::Stress),
    ("relationship", ClinicalCategory::Relationships),
    ("family", ClinicalCategory::Relationships),
    ("academic", ClinicalCategory::Academic),
    ("school", ClinicalCategory::Academic),
    ("exam", ClinicalCategory::Academic),
    ("sleep", ClinicalCategory::Sleep),
    ("insomnia", ClinicalCategory::Sleep),
];

/// Decision-type substrings, checked in order.
pub const DECISION_PATTERNS: &[(&str, TriageCategory)] = &[
    ("emergency", TriageCategory::Crisis),
    ("crisis", TriageCategory::Crisis),
    ("immediate", TriageCategory::Crisis),
    ("urgent", TriageCategory::Crisis),
    ("monitor", TriageCategory::Caution),
    ("follow-up", TriageCategory::Caution),
    ("follow up", TriageCategory::Caution),
    ("refer", TriageCategory::Caution),
    ("treatment", TriageCategory::Caution),
    ("routine", TriageCategory::Safe),
    ("maintenance", TriageCategory::Safe),
    ("stable", TriageCategory::Safe),
];

/// Urgency substrings consulted when the decision type matched nothing.
pub const URGENCY_PATTERNS: &[(&str, TriageCategory)] = &[
    ("high", TriageCategory::Crisis),
    ("immediate", TriageCategory::Crisis),
    ("medium", TriageCategory::Caution),
    ("moderate", TriageCategory::Caution),
];

/// Severity at or above which a category escalates one step.
pub const SEVERITY_ESCALATE: f64 = 0.8;
/// Severity at or above which Safe is raised to Caution.
pub const SEVERITY_ELEVATE: f64 = 0.5;

fn first_match<T: Copy>(table: &[(&str, T)], haystack: &str) -> Option<T> {
    table
        .iter()
        .find(|(pattern, _)| haystack.contains(pattern))
        .map(|(_, value)| *value)
}

// ============================================================================
// Category Mapper
// ============================================================================

/// Rules engine turning clinical inputs into a [`TriageCategory`].
///
/// Holds no state. Unknown strings resolve to a safe default and never
/// silently to Crisis.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryMapper;

impl CategoryMapper {
    /// Create a new mapper.
    pub fn new() -> Self {
        Self
    }

    /// Map a PHQ-9 total to triage.
    ///
    /// A positive item 9 (self-harm ideation) forces Crisis regardless of
    /// the total. Otherwise: 20+ Crisis, 10-19 Caution, 0-9 Safe.
    pub fn map_phq9_to_triage(&self, total: u32, item9: Option<u32>) -> TriageCategory {
        if item9.is_some_and(|score| score >= 1) {
            return TriageCategory::Crisis;
        }
        match total {
            20.. => TriageCategory::Crisis,
            15..=19 => TriageCategory::Caution,
            10..=14 => TriageCategory::Caution,
            5..=9 => TriageCategory::Safe,
            _ => TriageCategory::Safe,
        }
    }

    /// Map a GAD-7 total to triage. Anxiety alone never reaches Crisis.
    pub fn map_gad7_to_triage(&self, total: u32) -> TriageCategory {
        match total {
            15.. => TriageCategory::Caution,
            10..=14 => TriageCategory::Caution,
            5..=9 => TriageCategory::Safe,
            _ => TriageCategory::Safe,
        }
    }

    /// True if `text` contains any crisis keyword (case-insensitive).
    pub fn contains_crisis_keyword(&self, text: &str) -> bool {
        !self.matched_crisis_keywords(text).is_empty()
    }

    /// Every crisis keyword found in `text`, in table order.
    pub fn matched_crisis_keywords(&self, text: &str) -> Vec<&'static str> {
        let lowered = text.to_lowercase();
        CRISIS_KEYWORDS
            .iter()
            .copied()
            .filter(|keyword| lowered.contains(keyword))
            .collect()
    }

    /// Resolve a free-text category to a clinical category.
    pub fn resolve_category(&self, category: &str) -> ClinicalCategory {
        first_match(CATEGORY_PATTERNS, &category.to_lowercase())
            .unwrap_or(ClinicalCategory::GeneralSupport)
    }

    /// Map a category string, optional message text and optional severity
    /// to triage.
    ///
    /// A crisis keyword in `text` short-circuits to Crisis. Otherwise the
    /// category's default triage is adjusted by `severity_score`:
    /// `>= 0.8` escalates Caution to Crisis and anything lower to at least
    /// Caution; `[0.5, 0.8)` raises Safe to Caution.
    pub fn map_category_to_triage(
        &self,
        category: &str,
        text: Option<&str>,
        severity_score: Option<f64>,
    ) -> TriageCategory {
        if let Some(text) = text {
            let matched = self.matched_crisis_keywords(text);
            if !matched.is_empty() {
                debug!(keywords = ?matched, "Crisis keyword match");
                return TriageCategory::Crisis;
            }
        }

        let clinical = self.resolve_category(category);
        let default = clinical.default_triage();

        match severity_score {
            Some(score) if score >= SEVERITY_ESCALATE => match default {
                TriageCategory::Caution => TriageCategory::Crisis,
                other => other.at_least(TriageCategory::Caution),
            },
            Some(score) if score >= SEVERITY_ELEVATE => match default {
                TriageCategory::Safe => TriageCategory::Caution,
                other => other,
            },
            _ => default,
        }
    }

    /// Map a clinical decision type (and optional urgency) to triage.
    pub fn map_clinical_decision(
        &self,
        decision_type: &str,
        urgency: Option<&str>,
    ) -> TriageCategory {
        if let Some(category) = first_match(DECISION_PATTERNS, &decision_type.to_lowercase()) {
            return category;
        }
        urgency
            .and_then(|u| first_match(URGENCY_PATTERNS, &u.to_lowercase()))
            .unwrap_or(TriageCategory::Safe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> CategoryMapper {
        CategoryMapper::new()
    }

    #[test]
    fn test_phq9_examples() {
        let m = mapper();
        assert_eq!(m.map_phq9_to_triage(2, Some(1)), TriageCategory::Crisis);
        assert_eq!(m.map_phq9_to_triage(22, Some(0)), TriageCategory::Crisis);
        assert_eq!(m.map_phq9_to_triage(12, Some(0)), TriageCategory::Caution);
        assert_eq!(m.map_phq9_to_triage(3, Some(0)), TriageCategory::Safe);
    }

    #[test]
    fn test_phq9_band_boundaries() {
        let m = mapper();
        assert_eq!(m.map_phq9_to_triage(4, None), TriageCategory::Safe);
        assert_eq!(m.map_phq9_to_triage(9, None), TriageCategory::Safe);
        assert_eq!(m.map_phq9_to_triage(10, None), TriageCategory::Caution);
        assert_eq!(m.map_phq9_to_triage(19, None), TriageCategory::Caution);
        assert_eq!(m.map_phq9_to_triage(20, None), TriageCategory::Crisis);
        assert_eq!(m.map_phq9_to_triage(27, None), TriageCategory::Crisis);
    }

    #[test]
    fn test_phq9_monotonic_without_item9() {
        let m = mapper();
        let mut previous = TriageCategory::Safe;
        for total in 0..=40 {
            let current = m.map_phq9_to_triage(total, Some(0));
            assert!(current >= previous, "not monotonic at {}", total);
            previous = current;
        }
    }

    #[test]
    fn test_phq9_item9_overrides_every_total() {
        let m = mapper();
        for total in 0..=27 {
            assert_eq!(m.map_phq9_to_triage(total, Some(2)), TriageCategory::Crisis);
        }
    }

    #[test]
    fn test_gad7_never_crisis() {
        let m = mapper();
        assert_eq!(m.map_gad7_to_triage(4), TriageCategory::Safe);
        assert_eq!(m.map_gad7_to_triage(9), TriageCategory::Safe);
        assert_eq!(m.map_gad7_to_triage(10), TriageCategory::Caution);
        assert_eq!(m.map_gad7_to_triage(21), TriageCategory::Caution);
        assert_eq!(m.map_gad7_to_triage(100), TriageCategory::Caution);
    }

    #[test]
    fn test_crisis_keyword_short_circuits() {
        let m = mapper();
        let result = m.map_category_to_triage(
            "academic",
            Some("Exams are fine but honestly I want to DIE"),
            Some(0.1),
        );
        assert_eq!(result, TriageCategory::Crisis);
    }

    #[test]
    fn test_category_defaults() {
        let m = mapper();
        assert_eq!(
            m.map_category_to_triage("Suicidal thoughts", None, None),
            TriageCategory::Crisis
        );
        assert_eq!(
            m.map_category_to_triage("Depression", None, None),
            TriageCategory::Caution
        );
        assert_eq!(
            m.map_category_to_triage("exam stress", None, None),
            TriageCategory::Safe
        );
        assert_eq!(
            m.map_category_to_triage("something unheard of", None, None),
            TriageCategory::Safe
        );
    }

    #[test]
    fn test_category_first_match_wins() {
        let m = mapper();
        // "depress" precedes "stress" in the table
        assert_eq!(
            m.resolve_category("depression and stress"),
            ClinicalCategory::Depression
        );
        assert_eq!(m.resolve_category("Panic attacks"), ClinicalCategory::Anxiety);
        assert_eq!(m.resolve_category(""), ClinicalCategory::GeneralSupport);
    }

    #[test]
    fn test_severity_adjustment() {
        let m = mapper();
        assert_eq!(
            m.map_category_to_triage("anxiety", None, Some(0.8)),
            TriageCategory::Crisis
        );
        assert_eq!(
            m.map_category_to_triage("stress", None, Some(0.9)),
            TriageCategory::Caution
        );
        assert_eq!(
            m.map_category_to_triage("stress", None, Some(0.5)),
            TriageCategory::Caution
        );
        assert_eq!(
            m.map_category_to_triage("anxiety", None, Some(0.79)),
            TriageCategory::Caution
        );
        assert_eq!(
            m.map_category_to_triage("stress", None, Some(0.49)),
            TriageCategory::Safe
        );
        assert_eq!(
            m.map_category_to_triage("self-harm", None, Some(0.9)),
            TriageCategory::Crisis
        );
    }

    #[test]
    fn test_text_without_keywords_falls_through() {
        let m = mapper();
        assert_eq!(
            m.map_category_to_triage("sleep", Some("I can't fall asleep before 3am"), None),
            TriageCategory::Safe
        );
    }

    #[test]
    fn test_clinical_decision_dispatch() {
        let m = mapper();
        assert_eq!(
            m.map_clinical_decision("Emergency referral", None),
            TriageCategory::Crisis
        );
        assert_eq!(
            m.map_clinical_decision("schedule follow-up", None),
            TriageCategory::Caution
        );
        assert_eq!(
            m.map_clinical_decision("refer to counselor", None),
            TriageCategory::Caution
        );
        assert_eq!(
            m.map_clinical_decision("routine check-in", Some("high")),
            TriageCategory::Safe
        );
        assert_eq!(
            m.map_clinical_decision("unknown", Some("HIGH")),
            TriageCategory::Crisis
        );
        assert_eq!(
            m.map_clinical_decision("unknown", Some("moderate")),
            TriageCategory::Caution
        );
        assert_eq!(m.map_clinical_decision("unknown", None), TriageCategory::Safe);
        assert_eq!(
            m.map_clinical_decision("unknown", Some("whenever")),
            TriageCategory::Safe
        );
    }

    #[test]
    fn test_matched_keywords_listed_in_table_order() {
        let m = mapper();
        let matched = m.matched_crisis_keywords("I feel suicidal and want to hurt myself");
        assert_eq!(matched, vec!["suicidal", "hurt myself"]);
        assert!(!m.contains_crisis_keyword("a normal day"));
    }
}
