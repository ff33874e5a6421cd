use placement_core::model::{
    GroupKey, LanguageLevel, Question, QuestionId, ValidatedQuestion,
};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{
        answer_key_to_text, answer_type_from_str, category_from_str, id_i64, insert_err,
        level_to_i64, map_question_row, options_to_json, ser, u32_from_i64,
    },
};
use crate::repository::{GroupCount, QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<Question, StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO questions (
                level, category, topic, title, options, answer_type, answer_key,
                media_path, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(level_to_i64(question.level))
        .bind(question.category.storage_name())
        .bind(question.topic.clone())
        .bind(question.title.clone())
        .bind(options_to_json(&question.options)?)
        .bind(question.answer_key.answer_type().storage_name())
        .bind(answer_key_to_text(&question.answer_key)?)
        .bind(question.media.as_ref().map(|m| m.path().to_owned()))
        .bind(question.created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        let id = u64::try_from(result.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("question_id sign overflow".into()))?;
        Ok(question.clone().assign_id(QuestionId::new(id)))
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, level, category, topic, title, options, answer_type, answer_key,
                media_path, created_at
            FROM questions
            WHERE id = ?1
            ",
        )
        .bind(id_i64("question_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_question_row(&row)
    }

    async fn counts_by_group(
        &self,
        level: LanguageLevel,
    ) -> Result<Vec<GroupCount>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT category, answer_type, topic, COUNT(*) AS question_count
            FROM questions
            WHERE level = ?1
            GROUP BY category, answer_type, topic
            ORDER BY category ASC, answer_type ASC, topic ASC
            ",
        )
        .bind(level_to_i64(level))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let category = category_from_str(&row.try_get::<String, _>("category").map_err(ser)?)?;
            let answer_type =
                answer_type_from_str(&row.try_get::<String, _>("answer_type").map_err(ser)?)?;
            let topic: String = row.try_get("topic").map_err(ser)?;
            let question_count = u32_from_i64(
                "question_count",
                row.try_get::<i64, _>("question_count").map_err(ser)?,
            )?;
            out.push(GroupCount {
                key: GroupKey {
                    level,
                    category,
                    answer_type,
                    topic,
                },
                question_count,
            });
        }
        Ok(out)
    }

    async fn nth_in_group(
        &self,
        key: &GroupKey,
        offset: u32,
    ) -> Result<Option<Question>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, level, category, topic, title, options, answer_type, answer_key,
                media_path, created_at
            FROM questions
            WHERE level = ?1 AND category = ?2 AND answer_type = ?3 AND topic = ?4
            ORDER BY id ASC
            LIMIT 1 OFFSET ?5
            ",
        )
        .bind(level_to_i64(key.level))
        .bind(key.category.storage_name())
        .bind(key.answer_type.storage_name())
        .bind(key.topic.clone())
        .bind(i64::from(offset))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_question_row).transpose()
    }
}
