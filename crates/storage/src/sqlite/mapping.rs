use placement_core::model::{
    AnswerKey, AnswerType, LanguageLevel, MediaRef, ProgressStep, Question, QuestionCategory,
    QuestionId, User, UserId,
};
use sqlx::Row;
use uuid::Uuid;

use crate::repository::{StepWithQuestion, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Levels are stored by ladder index (1..=9 for the testable span).
pub(crate) fn level_to_i64(level: LanguageLevel) -> i64 {
    i64::from(level.index())
}

pub(crate) fn level_from_i64(v: i64) -> Result<LanguageLevel, StorageError> {
    let index = u8::try_from(v).map_err(|_| ser(format!("invalid level index: {v}")))?;
    LanguageLevel::from_index(index).map_err(ser)
}

pub(crate) fn category_from_str(s: &str) -> Result<QuestionCategory, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn answer_type_from_str(s: &str) -> Result<AnswerType, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn options_to_json(options: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(options).map_err(ser)
}

pub(crate) fn options_from_json(raw: &str) -> Result<Vec<String>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

/// Choice keys store the exact text a submission must match; fill-in keys
/// store their accepted answers as a JSON array.
pub(crate) fn answer_key_to_text(key: &AnswerKey) -> Result<String, StorageError> {
    match key.choice_text() {
        Some(text) => Ok(text.to_string()),
        None => serde_json::to_string(key.accepted_answers().unwrap_or(&[])).map_err(ser),
    }
}

pub(crate) fn answer_key_from_text(
    answer_type: AnswerType,
    raw: &str,
) -> Result<AnswerKey, StorageError> {
    match answer_type {
        AnswerType::SelectOne => AnswerKey::parse_select_one(raw).map_err(ser),
        AnswerType::SelectMultiple => AnswerKey::parse_select_multiple(raw).map_err(ser),
        AnswerType::FillTheBlank => {
            let accepted: Vec<String> = serde_json::from_str(raw).map_err(ser)?;
            AnswerKey::fill_the_blank(accepted).map_err(ser)
        }
    }
}

pub(crate) fn public_id_from_str(s: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(s).map_err(ser)
}

/// Maps unique-constraint failures to `Conflict`; everything else is a
/// connection-level failure.
pub(crate) fn insert_err(e: sqlx::Error) -> StorageError {
    if e.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
    {
        StorageError::Conflict
    } else {
        StorageError::Connection(e.to_string())
    }
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let answer_type = answer_type_from_str(&row.try_get::<String, _>("answer_type").map_err(ser)?)?;
    let answer_key =
        answer_key_from_text(answer_type, &row.try_get::<String, _>("answer_key").map_err(ser)?)?;
    let media = row
        .try_get::<Option<String>, _>("media_path")
        .map_err(ser)?
        .map(MediaRef::from_path)
        .transpose()
        .map_err(ser)?;

    Question::from_persisted(
        question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        level_from_i64(row.try_get::<i64, _>("level").map_err(ser)?)?,
        category_from_str(&row.try_get::<String, _>("category").map_err(ser)?)?,
        row.try_get("topic").map_err(ser)?,
        row.try_get("title").map_err(ser)?,
        options_from_json(&row.try_get::<String, _>("options").map_err(ser)?)?,
        answer_key,
        media,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_user_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, StorageError> {
    Ok(User {
        id: user_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        public_id: public_id_from_str(&row.try_get::<String, _>("public_id").map_err(ser)?)?,
        email: row.try_get("email").map_err(ser)?,
        full_name: row.try_get("full_name").map_err(ser)?,
        start_level: level_from_i64(row.try_get::<i64, _>("start_level").map_err(ser)?)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_step_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProgressStep, StorageError> {
    Ok(ProgressStep {
        user_id: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        step_number: u32_from_i64("step_number", row.try_get::<i64, _>("step_number").map_err(ser)?)?,
        question_id: question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        given_answer: row.try_get("given_answer").map_err(ser)?,
        is_correct: row.try_get::<Option<bool>, _>("is_correct").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        answered_at: row.try_get("answered_at").map_err(ser)?,
    })
}

/// Maps a row of the step/question join. Question columns carry a `q_`
/// prefix so they cannot collide with the step's own columns.
pub(crate) fn map_joined_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<StepWithQuestion, StorageError> {
    let answer_type =
        answer_type_from_str(&row.try_get::<String, _>("q_answer_type").map_err(ser)?)?;
    let answer_key = answer_key_from_text(
        answer_type,
        &row.try_get::<String, _>("q_answer_key").map_err(ser)?,
    )?;
    let media = row
        .try_get::<Option<String>, _>("q_media_path")
        .map_err(ser)?
        .map(MediaRef::from_path)
        .transpose()
        .map_err(ser)?;

    let question = Question::from_persisted(
        question_id_from_i64(row.try_get::<i64, _>("q_id").map_err(ser)?)?,
        level_from_i64(row.try_get::<i64, _>("q_level").map_err(ser)?)?,
        category_from_str(&row.try_get::<String, _>("q_category").map_err(ser)?)?,
        row.try_get("q_topic").map_err(ser)?,
        row.try_get("q_title").map_err(ser)?,
        options_from_json(&row.try_get::<String, _>("q_options").map_err(ser)?)?,
        answer_key,
        media,
        row.try_get("q_created_at").map_err(ser)?,
    )
    .map_err(ser)?;

    Ok(StepWithQuestion {
        step: map_step_row(row)?,
        question,
    })
}
