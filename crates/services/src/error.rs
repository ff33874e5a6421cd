//! Shared error types for the services crate.

use thiserror::Error;

use placement_core::model::{
    CursorError, LanguageLevel, QuestionCategory, StatsError, StepError, UserValidationError,
};
use placement_core::progression::ProgressionError;
use storage::repository::StorageError;

/// Errors emitted while generating a question batch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BatchError {
    #[error("no questions available at level {level}")]
    NoQuestionsForLevel { level: LanguageLevel },
    #[error("sampling group {category}/{topic} has no questions")]
    EmptyGroup {
        category: QuestionCategory,
        topic: String,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `PlacementService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlacementError {
    #[error("no question has been served yet")]
    NothingServed,
    #[error(transparent)]
    Registration(#[from] UserValidationError),
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error(transparent)]
    Progression(#[from] ProgressionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StatsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatsServiceError {
    #[error("no registration under this result token")]
    UnknownUser,
    #[error("the test is still in progress")]
    InProgress,
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
