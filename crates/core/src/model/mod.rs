mod ids;
mod level;
mod question;
mod step;
mod stats;
mod user;

pub use ids::{ParseIdError, QuestionId, UserId};
pub use level::{LanguageLevel, LevelRangeError, ParseLevelError};

pub use question::{
    AnswerKey, AnswerKeyError, AnswerType, GroupKey, MediaError, MediaKind, MediaRef,
    ParseAnswerTypeError, ParseCategoryError, Question, QuestionCategory, QuestionDraft,
    QuestionValidationError, ValidatedQuestion,
};
pub use stats::{
    AnsweredStep, PASS_THRESHOLD, PassedLevelStats, StatsError, SummarizedStats, TopicBreakdown,
};
pub use step::{ProgressStep, StepError};
pub use user::{CursorError, SessionCursor, User, UserDraft, UserValidationError, ValidatedUser};
