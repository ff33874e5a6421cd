use chrono::{DateTime, Utc};
use placement_core::model::{ProgressStep, UserId};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{
        category_from_str, id_i64, insert_err, level_from_i64, map_joined_row, ser, u32_from_i64,
    },
};
use crate::repository::{
    LevelOutcome, ProgressRepository, StepWithQuestion, StorageError, TopicOutcome,
};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn append_steps(&self, steps: &[ProgressStep]) -> Result<(), StorageError> {
        if steps.is_empty() {
            return Ok(());
        }

        // One transaction for the whole batch; a duplicate step number rolls
        // everything back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for step in steps {
            sqlx::query(
                r"
                INSERT INTO progress_steps (
                    user_id, step_number, question_id, given_answer, is_correct,
                    created_at, answered_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(id_i64("user_id", step.user_id.value())?)
            .bind(i64::from(step.step_number))
            .bind(id_i64("question_id", step.question_id.value())?)
            .bind(step.given_answer.clone())
            .bind(step.is_correct)
            .bind(step.created_at)
            .bind(step.answered_at)
            .execute(&mut *tx)
            .await
            .map_err(insert_err)?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    async fn step_with_question(
        &self,
        user_id: UserId,
        step_number: u32,
    ) -> Result<StepWithQuestion, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                s.user_id, s.step_number, s.question_id, s.given_answer, s.is_correct,
                s.created_at, s.answered_at,
                q.id AS q_id, q.level AS q_level, q.category AS q_category,
                q.topic AS q_topic, q.title AS q_title, q.options AS q_options,
                q.answer_type AS q_answer_type, q.answer_key AS q_answer_key,
                q.media_path AS q_media_path, q.created_at AS q_created_at
            FROM progress_steps s
            JOIN questions q ON q.id = s.question_id
            WHERE s.user_id = ?1 AND s.step_number = ?2
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .bind(i64::from(step_number))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_joined_row(&row)
    }

    async fn record_answer(
        &self,
        user_id: UserId,
        step_number: u32,
        given: &str,
        correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let user = id_i64("user_id", user_id.value())?;
        let step = i64::from(step_number);

        // The IS NULL guard makes the first write win; a second submission
        // touches zero rows.
        let result = sqlx::query(
            r"
            UPDATE progress_steps
            SET given_answer = ?3, is_correct = ?4, answered_at = ?5
            WHERE user_id = ?1 AND step_number = ?2 AND given_answer IS NULL
            ",
        )
        .bind(user)
        .bind(step)
        .bind(given.to_owned())
        .bind(correct)
        .bind(answered_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists = sqlx::query(
            r"
            SELECT 1 FROM progress_steps WHERE user_id = ?1 AND step_number = ?2
            ",
        )
        .bind(user)
        .bind(step)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if exists.is_some() {
            Err(StorageError::Conflict)
        } else {
            Err(StorageError::NotFound)
        }
    }

    async fn unanswered_count(&self, user_id: UserId) -> Result<u32, StorageError> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS unanswered
            FROM progress_steps
            WHERE user_id = ?1 AND given_answer IS NULL
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        u32_from_i64("unanswered", row.try_get::<i64, _>("unanswered").map_err(ser)?)
    }

    async fn level_outcomes(&self, user_id: UserId) -> Result<Vec<LevelOutcome>, StorageError> {
        // The ladder walk visits each level at most once, so the first step
        // number orders levels chronologically.
        let rows = sqlx::query(
            r"
            SELECT
                q.level AS level,
                MIN(s.step_number) AS first_step_number,
                COUNT(*) AS total,
                SUM(CASE WHEN s.is_correct = 1 THEN 1 ELSE 0 END) AS correct
            FROM progress_steps s
            JOIN questions q ON q.id = s.question_id
            WHERE s.user_id = ?1 AND s.is_correct IS NOT NULL
            GROUP BY q.level
            ORDER BY first_step_number ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(LevelOutcome {
                level: level_from_i64(row.try_get::<i64, _>("level").map_err(ser)?)?,
                first_step_number: u32_from_i64(
                    "first_step_number",
                    row.try_get::<i64, _>("first_step_number").map_err(ser)?,
                )?,
                total: u32_from_i64("total", row.try_get::<i64, _>("total").map_err(ser)?)?,
                correct: u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?,
            });
        }
        Ok(out)
    }

    async fn topic_outcomes(&self, user_id: UserId) -> Result<Vec<TopicOutcome>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                q.category AS category,
                q.topic AS topic,
                COUNT(*) AS total,
                SUM(CASE WHEN s.is_correct = 1 THEN 1 ELSE 0 END) AS correct
            FROM progress_steps s
            JOIN questions q ON q.id = s.question_id
            WHERE s.user_id = ?1 AND s.is_correct IS NOT NULL
            GROUP BY q.category, q.topic
            ORDER BY q.category ASC, q.topic ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(TopicOutcome {
                category: category_from_str(&row.try_get::<String, _>("category").map_err(ser)?)?,
                topic: row.try_get("topic").map_err(ser)?,
                total: u32_from_i64("total", row.try_get::<i64, _>("total").map_err(ser)?)?,
                correct: u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?,
            });
        }
        Ok(out)
    }

    async fn answered_steps(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StepWithQuestion>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                s.user_id, s.step_number, s.question_id, s.given_answer, s.is_correct,
                s.created_at, s.answered_at,
                q.id AS q_id, q.level AS q_level, q.category AS q_category,
                q.topic AS q_topic, q.title AS q_title, q.options AS q_options,
                q.answer_type AS q_answer_type, q.answer_key AS q_answer_key,
                q.media_path AS q_media_path, q.created_at AS q_created_at
            FROM progress_steps s
            JOIN questions q ON q.id = s.question_id
            WHERE s.user_id = ?1 AND s.is_correct IS NOT NULL
            ORDER BY s.step_number ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_joined_row(&row)?);
        }
        Ok(out)
    }
}
