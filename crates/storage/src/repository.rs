use async_trait::async_trait;
use chrono::{DateTime, Utc};
use placement_core::model::{
    GroupKey, LanguageLevel, ProgressStep, Question, QuestionCategory, QuestionId, User, UserId,
    ValidatedQuestion, ValidatedUser,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── QUERY RECORDS ─────────────────────────────────────────────────────────────
//

/// How many questions one sampling group currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub key: GroupKey,
    pub question_count: u32,
}

/// Answered-step tallies for one level of a taker's history.
///
/// `first_step_number` is the earliest step served at the level, which is
/// what orders a history chronologically: each level is visited in one
/// contiguous batch, so the first step is enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelOutcome {
    pub level: LanguageLevel,
    pub first_step_number: u32,
    pub total: u32,
    pub correct: u32,
}

/// Answered-step tallies for one `(category, topic)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicOutcome {
    pub category: QuestionCategory,
    pub topic: String,
    pub total: u32,
    pub correct: u32,
}

/// A progress step joined with the question it served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepWithQuestion {
    pub step: ProgressStep,
    pub question: Question,
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Repository contract for the question catalog.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Persist a validated question and return it with its generated id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn insert_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<Question, StorageError>;

    /// Fetch a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError>;

    /// Question counts per sampling group at a level, ordered by category,
    /// answer type, then topic (storage-name order). An empty vec means the
    /// level has no questions at all.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counts cannot be read.
    async fn counts_by_group(
        &self,
        level: LanguageLevel,
    ) -> Result<Vec<GroupCount>, StorageError>;

    /// The question at `offset` within a group's id-ordered questions, or
    /// `None` when the offset runs past the group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn nth_in_group(
        &self,
        key: &GroupKey,
        offset: u32,
    ) -> Result<Option<Question>, StorageError>;
}

/// Repository contract for registered test takers.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a validated registration and return it with its generated id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the public id is already taken,
    /// or other storage errors.
    async fn create_user(&self, user: &ValidatedUser) -> Result<User, StorageError>;

    /// Fetch a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_user(&self, id: UserId) -> Result<User, StorageError>;

    /// Look a user up by the public result token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn find_by_public_id(&self, public_id: Uuid) -> Result<Option<User>, StorageError>;
}

/// Repository contract for a taker's served steps and answers.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Append a batch of steps, all of them or none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if any step number already exists
    /// for the user; no step of the batch is kept in that case.
    async fn append_steps(&self, steps: &[ProgressStep]) -> Result<(), StorageError>;

    /// Fetch one step joined with its question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if either side is missing.
    async fn step_with_question(
        &self,
        user_id: UserId,
        step_number: u32,
    ) -> Result<StepWithQuestion, StorageError>;

    /// Record a submitted answer and its verdict, exactly once.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the step does not exist and
    /// `StorageError::Conflict` if it already holds an answer; the stored
    /// answer is never overwritten.
    async fn record_answer(
        &self,
        user_id: UserId,
        step_number: u32,
        given: &str,
        correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Number of the taker's steps that have no answer yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the count cannot be read.
    async fn unanswered_count(&self, user_id: UserId) -> Result<u32, StorageError>;

    /// Per-level tallies over answered steps, ordered by the first step
    /// served at each level.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the tallies cannot be read.
    async fn level_outcomes(&self, user_id: UserId) -> Result<Vec<LevelOutcome>, StorageError>;

    /// Per-topic tallies over answered steps, ordered by category then topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the tallies cannot be read.
    async fn topic_outcomes(&self, user_id: UserId) -> Result<Vec<TopicOutcome>, StorageError>;

    /// Every answered step joined with its question, in step order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the join cannot be read.
    async fn answered_steps(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StepWithQuestion>, StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<HashMap<QuestionId, Question>>>,
    next_question_id: Arc<Mutex<u64>>,
    users: Arc<Mutex<HashMap<UserId, User>>>,
    next_user_id: Arc<Mutex<u64>>,
    steps: Arc<Mutex<HashMap<(UserId, u32), ProgressStep>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<Question, StorageError> {
        let mut next = self.next_question_id.lock().map_err(lock_err)?;
        *next += 1;
        let id = QuestionId::new(*next);

        let stored = question.clone().assign_id(id);
        let mut guard = self.questions.lock().map_err(lock_err)?;
        guard.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn counts_by_group(
        &self,
        level: LanguageLevel,
    ) -> Result<Vec<GroupCount>, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;

        let mut counts: HashMap<GroupKey, u32> = HashMap::new();
        for question in guard.values().filter(|q| q.level == level) {
            *counts.entry(question.group_key()).or_insert(0) += 1;
        }

        let mut out: Vec<GroupCount> = counts
            .into_iter()
            .map(|(key, question_count)| GroupCount {
                key,
                question_count,
            })
            .collect();
        out.sort_by(|a, b| {
            (
                a.key.category.storage_name(),
                a.key.answer_type.storage_name(),
                &a.key.topic,
            )
                .cmp(&(
                    b.key.category.storage_name(),
                    b.key.answer_type.storage_name(),
                    &b.key.topic,
                ))
        });
        Ok(out)
    }

    async fn nth_in_group(
        &self,
        key: &GroupKey,
        offset: u32,
    ) -> Result<Option<Question>, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;

        let mut members: Vec<&Question> = guard
            .values()
            .filter(|q| q.group_key() == *key)
            .collect();
        members.sort_by_key(|q| q.id);

        Ok(members.get(offset as usize).map(|q| (*q).clone()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(&self, user: &ValidatedUser) -> Result<User, StorageError> {
        let mut guard = self.users.lock().map_err(lock_err)?;
        if guard.values().any(|u| u.public_id == user.public_id) {
            return Err(StorageError::Conflict);
        }

        let mut next = self.next_user_id.lock().map_err(lock_err)?;
        *next += 1;
        let stored = user.clone().assign_id(UserId::new(*next));
        guard.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        let guard = self.users.lock().map_err(lock_err)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_by_public_id(&self, public_id: Uuid) -> Result<Option<User>, StorageError> {
        let guard = self.users.lock().map_err(lock_err)?;
        Ok(guard.values().find(|u| u.public_id == public_id).cloned())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn append_steps(&self, steps: &[ProgressStep]) -> Result<(), StorageError> {
        let mut guard = self.steps.lock().map_err(lock_err)?;

        // refuse the whole batch before touching anything
        for step in steps {
            if guard.contains_key(&(step.user_id, step.step_number)) {
                return Err(StorageError::Conflict);
            }
        }
        for step in steps {
            guard.insert((step.user_id, step.step_number), step.clone());
        }
        Ok(())
    }

    async fn step_with_question(
        &self,
        user_id: UserId,
        step_number: u32,
    ) -> Result<StepWithQuestion, StorageError> {
        let questions = self.questions.lock().map_err(lock_err)?;
        let steps = self.steps.lock().map_err(lock_err)?;

        let step = steps
            .get(&(user_id, step_number))
            .cloned()
            .ok_or(StorageError::NotFound)?;
        let question = questions
            .get(&step.question_id)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        Ok(StepWithQuestion { step, question })
    }

    async fn record_answer(
        &self,
        user_id: UserId,
        step_number: u32,
        given: &str,
        correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.steps.lock().map_err(lock_err)?;
        let step = guard
            .get_mut(&(user_id, step_number))
            .ok_or(StorageError::NotFound)?;
        step.answer(given.to_string(), correct, answered_at)
            .map_err(|_| StorageError::Conflict)
    }

    async fn unanswered_count(&self, user_id: UserId) -> Result<u32, StorageError> {
        let guard = self.steps.lock().map_err(lock_err)?;
        let count = guard
            .values()
            .filter(|s| s.user_id == user_id && !s.is_answered())
            .count();
        u32::try_from(count).map_err(|_| StorageError::Serialization("step count overflow".into()))
    }

    async fn level_outcomes(&self, user_id: UserId) -> Result<Vec<LevelOutcome>, StorageError> {
        let questions = self.questions.lock().map_err(lock_err)?;
        let steps = self.steps.lock().map_err(lock_err)?;

        let mut by_level: HashMap<LanguageLevel, LevelOutcome> = HashMap::new();
        for step in steps
            .values()
            .filter(|s| s.user_id == user_id && s.is_answered())
        {
            let question = questions
                .get(&step.question_id)
                .ok_or(StorageError::NotFound)?;
            let entry = by_level
                .entry(question.level)
                .or_insert_with(|| LevelOutcome {
                    level: question.level,
                    first_step_number: step.step_number,
                    total: 0,
                    correct: 0,
                });
            entry.first_step_number = entry.first_step_number.min(step.step_number);
            entry.total += 1;
            if step.is_correct == Some(true) {
                entry.correct += 1;
            }
        }

        let mut out: Vec<LevelOutcome> = by_level.into_values().collect();
        out.sort_by_key(|o| o.first_step_number);
        Ok(out)
    }

    async fn topic_outcomes(&self, user_id: UserId) -> Result<Vec<TopicOutcome>, StorageError> {
        let questions = self.questions.lock().map_err(lock_err)?;
        let steps = self.steps.lock().map_err(lock_err)?;

        let mut by_topic: HashMap<(QuestionCategory, String), TopicOutcome> = HashMap::new();
        for step in steps
            .values()
            .filter(|s| s.user_id == user_id && s.is_answered())
        {
            let question = questions
                .get(&step.question_id)
                .ok_or(StorageError::NotFound)?;
            let entry = by_topic
                .entry((question.category, question.topic.clone()))
                .or_insert_with(|| TopicOutcome {
                    category: question.category,
                    topic: question.topic.clone(),
                    total: 0,
                    correct: 0,
                });
            entry.total += 1;
            if step.is_correct == Some(true) {
                entry.correct += 1;
            }
        }

        let mut out: Vec<TopicOutcome> = by_topic.into_values().collect();
        out.sort_by(|a, b| {
            (a.category.storage_name(), &a.topic).cmp(&(b.category.storage_name(), &b.topic))
        });
        Ok(out)
    }

    async fn answered_steps(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StepWithQuestion>, StorageError> {
        let questions = self.questions.lock().map_err(lock_err)?;
        let steps = self.steps.lock().map_err(lock_err)?;

        let mut answered: Vec<&ProgressStep> = steps
            .values()
            .filter(|s| s.user_id == user_id && s.is_answered())
            .collect();
        answered.sort_by_key(|s| s.step_number);

        let mut out = Vec::with_capacity(answered.len());
        for step in answered {
            let question = questions
                .get(&step.question_id)
                .cloned()
                .ok_or(StorageError::NotFound)?;
            out.push(StepWithQuestion {
                step: step.clone(),
                question,
            });
        }
        Ok(out)
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            questions: Arc::new(repo.clone()),
            users: Arc::new(repo.clone()),
            progress: Arc::new(repo),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
