// db/userdb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::{db::DBClient, StoreError};
use crate::models::usermodel::{User, UserRole};

#[async_trait]
pub trait UserExt: Send + Sync {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::Conflict` when the email is taken.
    async fn save_user(
        &self,
        email: String,
        password: String,
        role: UserRole,
    ) -> Result<User, StoreError>;

    async fn delete_user(
        &self,
        user_id: Uuid,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password, role, created_at, updated_at
                FROM users
                WHERE id = $1
                "#
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password, role, created_at, updated_at
                FROM users
                WHERE lower(email) = lower($1)
                "#
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn save_user(
        &self,
        email: String,
        password: String,
        role: UserRole,
    ) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password, role, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(password)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(format!("user {} already exists", email))
            }
            _ => StoreError::Database(e),
        })
    }

    async fn delete_user(
        &self,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
