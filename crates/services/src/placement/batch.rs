use chrono::{DateTime, Utc};
use rand::Rng;

use placement_core::model::{LanguageLevel, ProgressStep, UserId};
use storage::repository::{ProgressRepository, QuestionRepository};

use crate::error::BatchError;

/// One persisted batch of freshly served steps.
#[derive(Debug, Clone)]
pub(crate) struct GeneratedBatch {
    pub steps: Vec<ProgressStep>,
    pub len: u32,
}

/// Samples and persists level batches.
pub(crate) struct BatchGenerator;

impl BatchGenerator {
    /// Draws one question per sampling group at `level` and appends the
    /// resulting steps directly after `last_step`.
    ///
    /// The whole batch is persisted in a single repository call, so a
    /// failure leaves no partial batch behind.
    ///
    /// # Errors
    ///
    /// - `NoQuestionsForLevel` when the level has no questions at all
    /// - `EmptyGroup` when a group vanishes between counting and sampling
    /// - `Storage` for repository failures
    pub async fn generate(
        questions: &dyn QuestionRepository,
        progress: &dyn ProgressRepository,
        user_id: UserId,
        level: LanguageLevel,
        last_step: u32,
        now: DateTime<Utc>,
    ) -> Result<GeneratedBatch, BatchError> {
        let groups = questions.counts_by_group(level).await?;
        if groups.is_empty() {
            return Err(BatchError::NoQuestionsForLevel { level });
        }

        // Draw every offset up front; the rng must not live across awaits.
        let offsets = {
            let mut rng = rand::rng();
            groups
                .iter()
                .map(|group| {
                    if group.question_count == 0 {
                        None
                    } else {
                        Some(rng.random_range(0..group.question_count))
                    }
                })
                .collect::<Vec<_>>()
        };

        let mut steps = Vec::with_capacity(groups.len());
        let mut step_number = last_step;
        for (group, offset) in groups.iter().zip(offsets) {
            let question = match offset {
                Some(offset) => questions.nth_in_group(&group.key, offset).await?,
                None => None,
            };
            let Some(question) = question else {
                tracing::error!(
                    level = %group.key.level,
                    category = %group.key.category,
                    topic = %group.key.topic,
                    "sampling group has no questions, aborting the batch"
                );
                return Err(BatchError::EmptyGroup {
                    category: group.key.category,
                    topic: group.key.topic.clone(),
                });
            };
            step_number += 1;
            steps.push(ProgressStep::new(user_id, step_number, question.id, now));
        }

        progress.append_steps(&steps).await?;
        tracing::debug!(level = %level, steps = steps.len(), "opened question batch");
        Ok(GeneratedBatch {
            len: step_number - last_step,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_core::model::{
        AnswerKey, AnswerType, GroupKey, Question, QuestionCategory, QuestionDraft, QuestionId,
        ValidatedQuestion,
    };
    use placement_core::time::fixed_now;
    use storage::repository::{GroupCount, InMemoryRepository, StorageError};

    fn seed_question(topic: &str) -> ValidatedQuestion {
        QuestionDraft {
            level: LanguageLevel::A1_1,
            category: QuestionCategory::Grammar,
            topic: topic.to_string(),
            title: format!("Question about {topic}"),
            options: vec!["a".to_string(), "b".to_string()],
            answer_key: AnswerKey::select_one(0),
            media: None,
        }
        .validate(fixed_now())
        .unwrap()
    }

    #[tokio::test]
    async fn batch_serves_one_question_per_group() {
        let repo = InMemoryRepository::new();
        for topic in ["articles", "plurals", "tenses"] {
            repo.insert_question(&seed_question(topic)).await.unwrap();
        }

        let user_id = UserId::new(1);
        let batch = BatchGenerator::generate(
            &repo,
            &repo,
            user_id,
            LanguageLevel::A1_1,
            0,
            fixed_now(),
        )
        .await
        .unwrap();

        assert_eq!(batch.len, 3);
        let numbers: Vec<u32> = batch.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(repo.unanswered_count(user_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn batch_numbers_continue_after_the_last_step() {
        let repo = InMemoryRepository::new();
        repo.insert_question(&seed_question("articles")).await.unwrap();

        let batch = BatchGenerator::generate(
            &repo,
            &repo,
            UserId::new(1),
            LanguageLevel::A1_1,
            5,
            fixed_now(),
        )
        .await
        .unwrap();

        assert_eq!(batch.len, 1);
        assert_eq!(batch.steps[0].step_number, 6);
    }

    #[tokio::test]
    async fn level_without_questions_is_an_error() {
        let repo = InMemoryRepository::new();
        let err = BatchGenerator::generate(
            &repo,
            &repo,
            UserId::new(1),
            LanguageLevel::B2_2,
            0,
            fixed_now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            BatchError::NoQuestionsForLevel {
                level: LanguageLevel::B2_2
            }
        ));
    }

    /// Catalog double whose counts disagree with its contents.
    struct MisreportingCatalog;

    #[async_trait::async_trait]
    impl QuestionRepository for MisreportingCatalog {
        async fn insert_question(
            &self,
            _question: &ValidatedQuestion,
        ) -> Result<Question, StorageError> {
            Err(StorageError::Conflict)
        }

        async fn get_question(&self, _id: QuestionId) -> Result<Question, StorageError> {
            Err(StorageError::NotFound)
        }

        async fn counts_by_group(
            &self,
            level: LanguageLevel,
        ) -> Result<Vec<GroupCount>, StorageError> {
            Ok(vec![GroupCount {
                key: GroupKey {
                    level,
                    category: QuestionCategory::Grammar,
                    answer_type: AnswerType::SelectOne,
                    topic: "articles".to_string(),
                },
                question_count: 2,
            }])
        }

        async fn nth_in_group(
            &self,
            _key: &GroupKey,
            _offset: u32,
        ) -> Result<Option<Question>, StorageError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn vanished_group_aborts_without_persisting() {
        let progress = InMemoryRepository::new();
        let user_id = UserId::new(1);

        let err = BatchGenerator::generate(
            &MisreportingCatalog,
            &progress,
            user_id,
            LanguageLevel::A1_1,
            0,
            fixed_now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BatchError::EmptyGroup { .. }));
        assert_eq!(progress.unanswered_count(user_id).await.unwrap(), 0);
    }
}
