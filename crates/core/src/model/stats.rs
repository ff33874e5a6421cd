use serde::Serialize;
use thiserror::Error;

use crate::model::level::LanguageLevel;
use crate::model::question::{AnswerType, MediaRef, QuestionCategory};

/// Share of correct answers a level batch needs to count as passed.
pub const PASS_THRESHOLD: u8 = 70;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatsError {
    #[error("no answered questions at {level}")]
    NoQuestions { level: LanguageLevel },

    #[error("correct count {correct} exceeds total {total}")]
    CountMismatch { correct: u32, total: u32 },
}

//
// ─── LEVEL STATS ───────────────────────────────────────────────────────────────
//

/// Outcome of one completed level batch.
///
/// The percentage is fixed at construction with a single rounding policy
/// (round half up), so the pass verdict is the same wherever it is asked.
///
/// # Examples
///
/// ```
/// use placement_core::model::{LanguageLevel, PassedLevelStats};
///
/// let stats = PassedLevelStats::from_counts(LanguageLevel::A1_1, 3, 4)?;
/// assert_eq!(stats.success_percentage(), 75);
/// assert!(stats.has_passed());
/// # Ok::<(), placement_core::model::StatsError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassedLevelStats {
    level: LanguageLevel,
    success_percentage: u8,
}

impl PassedLevelStats {
    /// Computes the percentage for `correct` out of `total` answers.
    ///
    /// # Errors
    ///
    /// - `NoQuestions` if `total` is zero
    /// - `CountMismatch` if `correct` exceeds `total`
    pub fn from_counts(
        level: LanguageLevel,
        correct: u32,
        total: u32,
    ) -> Result<Self, StatsError> {
        if total == 0 {
            return Err(StatsError::NoQuestions { level });
        }
        if correct > total {
            return Err(StatsError::CountMismatch { correct, total });
        }

        // round half up; correct <= total keeps this in 0..=100
        let percentage = (100 * u64::from(correct) + u64::from(total) / 2) / u64::from(total);
        #[allow(clippy::cast_possible_truncation)]
        let success_percentage = percentage as u8;

        Ok(Self {
            level,
            success_percentage,
        })
    }

    #[must_use]
    pub fn level(&self) -> LanguageLevel {
        self.level
    }

    #[must_use]
    pub fn success_percentage(&self) -> u8 {
        self.success_percentage
    }

    /// True when the batch met the pass threshold.
    #[must_use]
    pub fn has_passed(&self) -> bool {
        self.success_percentage >= PASS_THRESHOLD
    }
}

//
// ─── RESULT RECORDS ────────────────────────────────────────────────────────────
//

/// Per-topic slice of a finished test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicBreakdown {
    pub category: QuestionCategory,
    pub topic: String,
    pub total: u32,
    pub correct: u32,
}

/// The short form of a finished test's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummarizedStats {
    pub detected_level: LanguageLevel,
    pub total_questions: u32,
    pub total_correct: u32,
    pub per_topic: Vec<TopicBreakdown>,
}

/// One answered question in the detailed results, with the canonical answer
/// alongside what the taker submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnsweredStep {
    pub step_number: u32,
    pub title: String,
    pub level: LanguageLevel,
    pub answer_type: AnswerType,
    pub options: Vec<String>,
    pub media: Option<MediaRef>,
    pub correct_answer: String,
    pub given_answer: String,
    pub is_correct: bool,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
