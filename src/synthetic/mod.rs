//! Seeded synthetic session histories.
//!
//! Each generated student follows one [`PatternType`] shape, so a populated
//! store gives the pattern analyzer and the retrieval evaluator labeled data
//! without real records. Randomness comes only from the `StdRng` passed in;
//! the same seed always yields the same histories.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use tracing::info;

use crate::error::StoreResult;
use crate::patterns::PatternType;
use crate::store::{
    hash_entity_id, Metadata, VectorStore, ENTITY_HASH_KEY, RISK_SCORE_KEY, SESSION_ID_KEY,
};

/// Metadata key carrying the generated pattern label.
pub const PATTERN_KEY: &str = "synthetic_pattern";

const MIN_SESSIONS: usize = 4;
const MAX_SESSIONS: usize = 10;
const LOW: f64 = 0.15;
const HIGH: f64 = 0.65;

const TOPICS: &[&str] = &[
    "upcoming exams",
    "a roommate conflict",
    "trouble sleeping",
    "pressure from family",
    "feeling isolated on campus",
    "falling behind in coursework",
];

/// One generated session.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSession {
    pub session_id: String,
    pub content: String,
    pub risk_score: f64,
    pub created_at: DateTime<Utc>,
}

/// One generated student history.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticStudent {
    pub entity_hash: String,
    pub pattern: PatternType,
    pub sessions: Vec<SyntheticSession>,
}

/// Builds synthetic histories shaped like each [`PatternType`].
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    sessions_per_student: usize,
    students_per_pattern: usize,
    noise: f64,
    start: DateTime<Utc>,
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self {
            sessions_per_student: 6,
            students_per_pattern: 2,
            noise: 0.02,
            start: Utc
                .with_ymd_and_hms(2024, 9, 2, 10, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

impl SyntheticGenerator {
    /// Create a generator with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions per student, clamped to 4..=10 so every shape stays
    /// distinguishable.
    pub fn with_sessions_per_student(mut self, sessions: usize) -> Self {
        self.sessions_per_student = sessions.clamp(MIN_SESSIONS, MAX_SESSIONS);
        self
    }

    /// Students generated for each pattern.
    pub fn with_students_per_pattern(mut self, students: usize) -> Self {
        self.students_per_pattern = students;
        self
    }

    /// Uniform noise amplitude added to every score, capped at 0.02.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.clamp(0.0, 0.02);
        self
    }

    /// Timestamp of every student's first session.
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Noiseless score at position `i` of an `n`-session history.
    fn base_score(pattern: PatternType, i: usize, n: usize) -> f64 {
        let t = i as f64 / (n - 1) as f64;
        match pattern {
            PatternType::Escalating => 0.2 + 0.45 * t,
            PatternType::Improving => 0.65 - 0.45 * t,
            // Palindromic low/high alternation: zero slope, high variance.
            PatternType::Cyclical => {
                if i.min(n - 1 - i) % 2 == 0 {
                    LOW
                } else {
                    HIGH
                }
            }
            PatternType::Acute => match n - 1 - i {
                0 => 0.8,
                1 => 0.85,
                _ => 0.2,
            },
            PatternType::Chronic => 0.55,
            PatternType::Stable => 0.2,
        }
    }

    /// Risk scores for one student.
    pub fn trajectory(&self, pattern: PatternType, rng: &mut StdRng) -> Vec<f64> {
        let n = self.sessions_per_student;
        (0..n)
            .map(|i| {
                let jitter = rng.gen_range(-self.noise..=self.noise);
                (Self::base_score(pattern, i, n) + jitter).clamp(0.0, 1.0)
            })
            .collect()
    }

    fn session_text(
        entity_hash: &str,
        pattern: PatternType,
        index: usize,
        rng: &mut StdRng,
    ) -> String {
        let topic = TOPICS.choose(rng).copied().unwrap_or("school");
        let mood = match pattern {
            PatternType::Escalating => "heavier than last time",
            PatternType::Improving => "a bit lighter than before",
            PatternType::Cyclical => "up and down lately",
            PatternType::Acute => "suddenly overwhelmed",
            PatternType::Chronic => "still low most days",
            PatternType::Stable => "doing okay",
        };
        let student = entity_hash.get(..8).unwrap_or(entity_hash);
        format!(
            "Check-in {}, student {}: {}, about {}.",
            index + 1,
            student,
            mood,
            topic
        )
    }

    /// Build one student history.
    pub fn generate_student(
        &self,
        ordinal: usize,
        pattern: PatternType,
        rng: &mut StdRng,
    ) -> SyntheticStudent {
        let entity_hash = hash_entity_id(&format!("synthetic-{}-{}", pattern, ordinal));
        let scores = self.trajectory(pattern, rng);
        let sessions = scores
            .into_iter()
            .enumerate()
            .map(|(i, risk_score)| SyntheticSession {
                session_id: format!("{}_s{}", entity_hash, i + 1),
                content: Self::session_text(&entity_hash, pattern, i, rng),
                risk_score,
                created_at: self.start + Duration::days(i as i64),
            })
            .collect();

        SyntheticStudent {
            entity_hash,
            pattern,
            sessions,
        }
    }

    /// Build `students_per_pattern` students for every pattern.
    pub fn generate(&self, rng: &mut StdRng) -> Vec<SyntheticStudent> {
        PatternType::ALL
            .iter()
            .flat_map(|&pattern| (0..self.students_per_pattern).map(move |k| (pattern, k)))
            .map(|(pattern, k)| self.generate_student(k, pattern, rng))
            .collect()
    }

    /// Generate students and write every session into `store`.
    pub fn populate(
        &self,
        store: &VectorStore,
        rng: &mut StdRng,
    ) -> StoreResult<Vec<SyntheticStudent>> {
        let students = self.generate(rng);
        for student in &students {
            for session in &student.sessions {
                let mut metadata = Metadata::new();
                metadata.insert(ENTITY_HASH_KEY.to_string(), json!(student.entity_hash));
                metadata.insert(SESSION_ID_KEY.to_string(), json!(session.session_id));
                metadata.insert(RISK_SCORE_KEY.to_string(), json!(session.risk_score));
                metadata.insert(PATTERN_KEY.to_string(), json!(student.pattern.as_str()));
                store.add_document_at(&session.content, metadata, None, session.created_at)?;
            }
        }

        info!(
            students = students.len(),
            documents = store.len(),
            "Synthetic histories written to store"
        );
        Ok(students)
    }
}
