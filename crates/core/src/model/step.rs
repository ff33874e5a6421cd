use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{QuestionId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("step {step_number} already has an answer")]
    AlreadyAnswered { step_number: u32 },
}

//
// ─── PROGRESS STEP ─────────────────────────────────────────────────────────────
//

/// One served question in a taker's test, answered at most once.
///
/// Steps are append-only history: the answer fields start empty, get filled
/// exactly once by [`ProgressStep::answer`], and are never rewritten. The
/// verdict is computed at answer time and stored with the step, so later
/// catalog edits cannot rewrite what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStep {
    pub user_id: UserId,
    pub step_number: u32,
    pub question_id: QuestionId,
    pub given_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

impl ProgressStep {
    /// Creates an unanswered step.
    #[must_use]
    pub fn new(
        user_id: UserId,
        step_number: u32,
        question_id: QuestionId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            step_number,
            question_id,
            given_answer: None,
            is_correct: None,
            created_at,
            answered_at: None,
        }
    }

    /// True once an answer has been recorded.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.given_answer.is_some()
    }

    /// Records the submitted answer and its verdict.
    ///
    /// # Errors
    ///
    /// Returns `StepError::AlreadyAnswered` on a second submission; the
    /// first answer stands.
    pub fn answer(
        &mut self,
        given: String,
        correct: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StepError> {
        if self.is_answered() {
            return Err(StepError::AlreadyAnswered {
                step_number: self.step_number,
            });
        }
        self.given_answer = Some(given);
        self.is_correct = Some(correct);
        self.answered_at = Some(at);
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn step() -> ProgressStep {
        ProgressStep::new(UserId::new(1), 3, QuestionId::new(40), fixed_now())
    }

    #[test]
    fn new_step_is_unanswered() {
        let s = step();
        assert!(!s.is_answered());
        assert_eq!(s.given_answer, None);
        assert_eq!(s.is_correct, None);
        assert_eq!(s.answered_at, None);
    }

    #[test]
    fn answer_records_verdict_and_time() {
        let mut s = step();
        let at = fixed_now();
        s.answer("2".to_string(), true, at).unwrap();

        assert!(s.is_answered());
        assert_eq!(s.given_answer.as_deref(), Some("2"));
        assert_eq!(s.is_correct, Some(true));
        assert_eq!(s.answered_at, Some(at));
    }

    #[test]
    fn empty_submission_still_counts_as_an_answer() {
        let mut s = step();
        s.answer(String::new(), false, fixed_now()).unwrap();
        assert!(s.is_answered());
        assert_eq!(s.given_answer.as_deref(), Some(""));
    }

    #[test]
    fn second_answer_is_rejected_and_first_stands() {
        let mut s = step();
        s.answer("2".to_string(), true, fixed_now()).unwrap();

        let err = s.answer("0".to_string(), false, fixed_now()).unwrap_err();
        assert_eq!(err, StepError::AlreadyAnswered { step_number: 3 });
        assert_eq!(s.given_answer.as_deref(), Some("2"));
        assert_eq!(s.is_correct, Some(true));
    }
}
