//! Read side of a finished test: the summary and the detailed report.
//!
//! Results are addressed by the taker's public id, never by row id, and
//! nothing is revealed while the walk is still running. The detailed report
//! is the one place the canonical answers leave the system.

use std::sync::Arc;

use uuid::Uuid;

use placement_core::model::{
    AnsweredStep, LanguageLevel, PassedLevelStats, SummarizedStats, TopicBreakdown, User,
};
use placement_core::progression::detect_finished;
use storage::repository::{InMemoryRepository, ProgressRepository, UserRepository};

use crate::error::StatsServiceError;

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct StatsService {
    users: Arc<dyn UserRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl StatsService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { users, progress }
    }

    /// Service over a fresh in-memory store, for tests and local runs.
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self::new(Arc::new(repo.clone()), Arc::new(repo))
    }

    /// The short form of a finished test: detected level, overall counts,
    /// and per-topic tallies.
    ///
    /// # Errors
    ///
    /// - `UnknownUser` if no registration matches `public_id`
    /// - `InProgress` while the walk has not terminated
    /// - `Storage` for repository failures
    pub async fn summarized(&self, public_id: Uuid) -> Result<SummarizedStats, StatsServiceError> {
        let (user, detected_level) = self.finished(public_id).await?;

        let outcomes = self.progress.level_outcomes(user.id).await?;
        let total_questions = outcomes.iter().map(|o| o.total).sum();
        let total_correct = outcomes.iter().map(|o| o.correct).sum();

        let per_topic = self
            .progress
            .topic_outcomes(user.id)
            .await?
            .into_iter()
            .map(|t| TopicBreakdown {
                category: t.category,
                topic: t.topic,
                total: t.total,
                correct: t.correct,
            })
            .collect();

        Ok(SummarizedStats {
            detected_level,
            total_questions,
            total_correct,
            per_topic,
        })
    }

    /// Every answered question with the canonical answer next to the
    /// submitted one, in the order they were served.
    ///
    /// # Errors
    ///
    /// - `UnknownUser` if no registration matches `public_id`
    /// - `InProgress` while the walk has not terminated
    /// - `Storage` for repository failures
    pub async fn detailed(&self, public_id: Uuid) -> Result<Vec<AnsweredStep>, StatsServiceError> {
        let (user, _) = self.finished(public_id).await?;
        let rows = self.progress.answered_steps(user.id).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let given_answer = row.step.given_answer.unwrap_or_default();
                let is_correct = row.step.is_correct.unwrap_or(false);
                AnsweredStep {
                    step_number: row.step.step_number,
                    title: row.question.title,
                    level: row.question.level,
                    answer_type: row.question.answer_key.answer_type(),
                    options: row.question.options,
                    media: row.question.media,
                    correct_answer: row.question.answer_key.display_text(),
                    given_answer,
                    is_correct,
                }
            })
            .collect())
    }

    /// Resolves the registration and insists the walk has terminated.
    ///
    /// A test still counts as running both while a batch has unanswered
    /// steps and in the window where a batch is complete but the walk wants
    /// another level.
    async fn finished(
        &self,
        public_id: Uuid,
    ) -> Result<(User, LanguageLevel), StatsServiceError> {
        let user = self
            .users
            .find_by_public_id(public_id)
            .await?
            .ok_or(StatsServiceError::UnknownUser)?;

        if self.progress.unanswered_count(user.id).await? > 0 {
            return Err(StatsServiceError::InProgress);
        }

        let outcomes = self.progress.level_outcomes(user.id).await?;
        let stats = outcomes
            .iter()
            .map(|o| PassedLevelStats::from_counts(o.level, o.correct, o.total))
            .collect::<Result<Vec<_>, _>>()?;
        let detected_level = detect_finished(&stats).ok_or(StatsServiceError::InProgress)?;

        Ok((user, detected_level))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use placement_core::model::{
        AnswerKey, ProgressStep, QuestionCategory, QuestionDraft, UserDraft,
    };
    use placement_core::time::fixed_now;
    use storage::repository::QuestionRepository;

    async fn seeded_user(repo: &InMemoryRepository) -> User {
        let validated = UserDraft {
            email: "taker@example.com".to_string(),
            full_name: "Test Taker".to_string(),
            start_level: LanguageLevel::A1_1,
        }
        .validate(Uuid::new_v4(), fixed_now())
        .unwrap();
        repo.create_user(&validated).await.unwrap()
    }

    async fn seeded_question(
        repo: &InMemoryRepository,
        topic: &str,
    ) -> placement_core::model::Question {
        let validated = QuestionDraft {
            level: LanguageLevel::A1_1,
            category: QuestionCategory::Grammar,
            topic: topic.to_string(),
            title: format!("Question about {topic}"),
            options: vec!["right".to_string(), "wrong".to_string()],
            answer_key: AnswerKey::select_one(0),
            media: None,
        }
        .validate(fixed_now())
        .unwrap();
        repo.insert_question(&validated).await.unwrap()
    }

    fn service_over(repo: &InMemoryRepository) -> StatsService {
        StatsService::new(Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn unknown_public_id_is_rejected() {
        let service = StatsService::in_memory();
        let err = service.summarized(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StatsServiceError::UnknownUser));
    }

    #[tokio::test]
    async fn running_test_reveals_nothing() {
        let repo = InMemoryRepository::new();
        let service = service_over(&repo);
        let user = seeded_user(&repo).await;
        let question = seeded_question(&repo, "articles").await;

        // open batch
        repo.append_steps(&[ProgressStep::new(user.id, 1, question.id, fixed_now())])
            .await
            .unwrap();
        let err = service.summarized(user.public_id).await.unwrap_err();
        assert!(matches!(err, StatsServiceError::InProgress));

        // batch answered with a pass, but the walk wants another level
        repo.record_answer(user.id, 1, "0", true, fixed_now())
            .await
            .unwrap();
        let err = service.detailed(user.public_id).await.unwrap_err();
        assert!(matches!(err, StatsServiceError::InProgress));
    }

    #[tokio::test]
    async fn summarized_reports_the_detected_level_and_tallies() {
        let repo = InMemoryRepository::new();
        let service = service_over(&repo);
        let user = seeded_user(&repo).await;
        let question = seeded_question(&repo, "articles").await;

        repo.append_steps(&[ProgressStep::new(user.id, 1, question.id, fixed_now())])
            .await
            .unwrap();
        // a wrong answer at the bottom level terminates the walk at A0
        repo.record_answer(user.id, 1, "1", false, fixed_now())
            .await
            .unwrap();

        let summary = service.summarized(user.public_id).await.unwrap();
        assert_eq!(summary.detected_level, LanguageLevel::A0);
        assert_eq!(summary.total_questions, 1);
        assert_eq!(summary.total_correct, 0);
        assert_eq!(
            summary.per_topic,
            vec![TopicBreakdown {
                category: QuestionCategory::Grammar,
                topic: "articles".to_string(),
                total: 1,
                correct: 0,
            }]
        );

        // reading results does not change them
        let again = service.summarized(user.public_id).await.unwrap();
        assert_eq!(again, summary);
    }

    #[tokio::test]
    async fn detailed_reveals_the_answer_key_after_the_test() {
        let repo = InMemoryRepository::new();
        let service = service_over(&repo);
        let user = seeded_user(&repo).await;
        let question = seeded_question(&repo, "articles").await;

        repo.append_steps(&[ProgressStep::new(user.id, 1, question.id, fixed_now())])
            .await
            .unwrap();
        repo.record_answer(user.id, 1, "1", false, fixed_now())
            .await
            .unwrap();

        let report = service.detailed(user.public_id).await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].step_number, 1);
        assert_eq!(report[0].title, "Question about articles");
        assert_eq!(report[0].correct_answer, "0");
        assert_eq!(report[0].given_answer, "1");
        assert!(!report[0].is_correct);

        // reading the report does not change it
        let again = service.detailed(user.public_id).await.unwrap();
        assert_eq!(again, report);
    }
}
