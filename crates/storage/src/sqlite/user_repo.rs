use placement_core::model::{User, UserId, ValidatedUser};
use uuid::Uuid;

use super::{
    SqliteRepository,
    mapping::{id_i64, insert_err, level_to_i64, map_user_row},
};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn create_user(&self, user: &ValidatedUser) -> Result<User, StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO users (public_id, email, full_name, start_level, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(user.public_id.to_string())
        .bind(user.email.clone())
        .bind(user.full_name.clone())
        .bind(level_to_i64(user.start_level))
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        let id = u64::try_from(result.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("user_id sign overflow".into()))?;
        Ok(user.clone().assign_id(UserId::new(id)))
    }

    async fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, public_id, email, full_name, start_level, created_at
            FROM users
            WHERE id = ?1
            ",
        )
        .bind(id_i64("user_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_user_row(&row)
    }

    async fn find_by_public_id(&self, public_id: Uuid) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, public_id, email, full_name, start_level, created_at
            FROM users
            WHERE public_id = ?1
            ",
        )
        .bind(public_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_user_row).transpose()
    }
}
