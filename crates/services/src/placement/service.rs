//! Drives one placement test from registration to the detected level.

use std::sync::Arc;

use uuid::Uuid;

use placement_core::model::{
    LanguageLevel, PassedLevelStats, SessionCursor, StepError, User, UserDraft, UserId,
};
use placement_core::progression::{detect_finished, next_action, ProgressionOutcome};
use placement_core::Clock;
use storage::repository::{
    InMemoryRepository, ProgressRepository, QuestionRepository, UserRepository,
};

use crate::error::PlacementError;
use crate::placement::batch::BatchGenerator;
use crate::placement::view::QuestionView;

//
// ─── RESULT TYPES ──────────────────────────────────────────────────────────────
//

/// Everything a caller needs right after registration: the stored user, the
/// cursor to thread through later calls, and the first question.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedTest {
    pub user: User,
    pub cursor: SessionCursor,
    pub question: QuestionView,
}

/// What the test does after an answer is recorded.
///
/// The outcome never says whether the answer was right; takers learn their
/// per-question results only from the detailed report once the test is over.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Another question is waiting, possibly from a fresh batch at a
    /// different level.
    NextQuestion {
        cursor: SessionCursor,
        question: QuestionView,
    },
    /// The walk has terminated; look results up by `public_id`.
    Finished {
        public_id: Uuid,
        detected_level: LanguageLevel,
    },
}

/// Where a test currently stands, for callers resuming with a stored cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum TestStatus {
    NotStarted,
    InProgress { question: QuestionView },
    Finished {
        public_id: Uuid,
        detected_level: LanguageLevel,
    },
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Application service for running placement tests.
///
/// The service itself is stateless between calls: the [`SessionCursor`]
/// returned from each operation is the flow state, and the caller passes it
/// back in. That keeps one service instance usable for any number of
/// concurrent takers.
#[derive(Clone)]
pub struct PlacementService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
    users: Arc<dyn UserRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl PlacementService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        users: Arc<dyn UserRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            questions,
            users,
            progress,
        }
    }

    /// Service over a fresh in-memory store, for tests and local runs.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        let repo = InMemoryRepository::new();
        Self::new(
            clock,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo),
        )
    }

    /// Registers a taker and serves the first question of their first batch.
    ///
    /// # Errors
    ///
    /// - `Registration` if the draft fails validation
    /// - `Batch` if the start level has no questions
    /// - `Storage` for repository failures
    pub async fn start_test(&self, draft: UserDraft) -> Result<StartedTest, PlacementError> {
        let now = self.clock.now();
        let validated = draft.validate(Uuid::new_v4(), now)?;
        let user = self.users.create_user(&validated).await?;

        let cursor = SessionCursor::start(user.id);
        let batch = BatchGenerator::generate(
            self.questions.as_ref(),
            self.progress.as_ref(),
            user.id,
            user.start_level,
            cursor.current_step(),
            now,
        )
        .await?;
        let cursor = cursor.with_batch(batch.len)?.advance()?;
        let question = self.view_at(&cursor).await?;

        Ok(StartedTest {
            user,
            cursor,
            question,
        })
    }

    /// The question the cursor currently points at.
    ///
    /// # Errors
    ///
    /// - `NothingServed` for a cursor that has not received a batch yet
    /// - `Storage` if the step is gone or the store fails
    pub async fn current_question(
        &self,
        cursor: &SessionCursor,
    ) -> Result<QuestionView, PlacementError> {
        if cursor.current_step() == 0 {
            return Err(PlacementError::NothingServed);
        }
        self.view_at(cursor).await
    }

    /// Records an answer for the current step and moves the test forward.
    ///
    /// Within a batch this serves the next step. At the end of a batch it
    /// closes the level, asks the walk for its next move, and either opens a
    /// batch at the chosen level or finishes the test.
    ///
    /// # Errors
    ///
    /// - `NothingServed` for a cursor that has not received a batch yet
    /// - `Step` if this step was already answered
    /// - `Batch` if the next level has no questions
    /// - `Storage` for repository failures
    pub async fn submit_answer(
        &self,
        cursor: &SessionCursor,
        given: &str,
    ) -> Result<SubmitOutcome, PlacementError> {
        if cursor.current_step() == 0 {
            return Err(PlacementError::NothingServed);
        }
        let now = self.clock.now();
        let row = self
            .progress
            .step_with_question(cursor.user_id(), cursor.current_step())
            .await?;
        if row.step.is_answered() {
            return Err(StepError::AlreadyAnswered {
                step_number: row.step.step_number,
            }
            .into());
        }

        let correct = row.question.answer_key.matches(given);
        self.progress
            .record_answer(cursor.user_id(), cursor.current_step(), given, correct, now)
            .await?;

        if !cursor.at_batch_end() {
            let next = cursor.advance()?;
            let question = self.view_at(&next).await?;
            return Ok(SubmitOutcome::NextQuestion {
                cursor: next,
                question,
            });
        }

        // Batch complete: the level outcome is now final, ask the walk.
        let stats = self.level_stats(cursor.user_id()).await?;
        match next_action(&stats)? {
            ProgressionOutcome::Finished(detected_level) => {
                let user = self.users.get_user(cursor.user_id()).await?;
                tracing::debug!(user_id = %user.id, level = %detected_level, "placement walk finished");
                Ok(SubmitOutcome::Finished {
                    public_id: user.public_id,
                    detected_level,
                })
            }
            ProgressionOutcome::NextLevel(level) => {
                let batch = BatchGenerator::generate(
                    self.questions.as_ref(),
                    self.progress.as_ref(),
                    cursor.user_id(),
                    level,
                    cursor.current_step(),
                    now,
                )
                .await?;
                let next = cursor.with_batch(batch.len)?.advance()?;
                let question = self.view_at(&next).await?;
                Ok(SubmitOutcome::NextQuestion {
                    cursor: next,
                    question,
                })
            }
        }
    }

    /// Resolves what a stored cursor currently means.
    ///
    /// # Errors
    ///
    /// `Storage` if the step the cursor points at is gone or the store fails.
    pub async fn status(&self, cursor: Option<&SessionCursor>) -> Result<TestStatus, PlacementError> {
        let Some(cursor) = cursor else {
            return Ok(TestStatus::NotStarted);
        };
        if cursor.current_step() == 0 {
            return Ok(TestStatus::NotStarted);
        }

        let row = self
            .progress
            .step_with_question(cursor.user_id(), cursor.current_step())
            .await?;
        // Only a fully answered history can finish the walk; a half-answered
        // batch has no final level outcome yet.
        if row.step.is_answered()
            && self.progress.unanswered_count(cursor.user_id()).await? == 0
        {
            let stats = self.level_stats(cursor.user_id()).await?;
            if let Some(detected_level) = detect_finished(&stats) {
                let user = self.users.get_user(cursor.user_id()).await?;
                return Ok(TestStatus::Finished {
                    public_id: user.public_id,
                    detected_level,
                });
            }
        }
        Ok(TestStatus::InProgress {
            question: QuestionView::from_step(&row),
        })
    }

    async fn view_at(&self, cursor: &SessionCursor) -> Result<QuestionView, PlacementError> {
        let row = self
            .progress
            .step_with_question(cursor.user_id(), cursor.current_step())
            .await?;
        Ok(QuestionView::from_step(&row))
    }

    async fn level_stats(&self, user_id: UserId) -> Result<Vec<PassedLevelStats>, PlacementError> {
        let outcomes = self.progress.level_outcomes(user_id).await?;
        let stats = outcomes
            .iter()
            .map(|o| PassedLevelStats::from_counts(o.level, o.correct, o.total))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stats)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
