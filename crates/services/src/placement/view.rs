use serde::Serialize;

use placement_core::model::{AnswerType, LanguageLevel, MediaRef, QuestionCategory};
use storage::repository::StepWithQuestion;

/// Presentation-agnostic view of a served question.
///
/// This is what a taker is allowed to see while answering: the prompt, its
/// options and any media, but never the answer key. Detailed results reveal
/// the key only after the walk has finished, through `StatsService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub step_number: u32,
    pub level: LanguageLevel,
    pub category: QuestionCategory,
    pub topic: String,
    pub title: String,
    pub answer_type: AnswerType,
    pub options: Vec<String>,
    pub media: Option<MediaRef>,
}

impl QuestionView {
    #[must_use]
    pub fn from_step(row: &StepWithQuestion) -> Self {
        Self {
            step_number: row.step.step_number,
            level: row.question.level,
            category: row.question.category,
            topic: row.question.topic.clone(),
            title: row.question.title.clone(),
            answer_type: row.question.answer_key.answer_type(),
            options: row.question.options.clone(),
            media: row.question.media.clone(),
        }
    }
}
