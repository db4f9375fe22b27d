use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{NewUser, User};
use crate::{
    db::PgRepo,
    error::{is_unique_violation, ApiError},
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, ApiError>;
    /// Fails with a field validation error when email or username is taken.
    async fn create(&self, user: &NewUser) -> Result<User, ApiError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<(i64, Vec<User>), ApiError>;
    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), ApiError>;
    /// Authors followed by `user`, ordered by username.
    async fn list_following(
        &self,
        user: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<User>), ApiError>;
}

const USER_COLUMNS: &str =
    "u.id, u.email, u.username, u.first_name, u.last_name, u.password_hash, u.created_at";

#[async_trait]
impl UserRepo for PgRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("find users")?;
        Ok(users)
    }

    async fn create(&self, user: &NewUser) -> Result<User, ApiError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, username, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, username, first_name, last_name, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(u) => Ok(u),
            Err(e) if is_unique_violation(&e) => {
                let constraint = e
                    .as_database_error()
                    .and_then(|db| db.constraint())
                    .unwrap_or_default();
                if constraint.contains("username") {
                    Err(ApiError::validation("username", "username already taken"))
                } else {
                    Err(ApiError::validation("email", "email already registered"))
                }
            }
            Err(e) => Err(anyhow::Error::new(e).context("create user").into()),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(i64, Vec<User>), ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .context("count users")?;
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u ORDER BY u.username LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok((count, users))
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), ApiError> {
        let done = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("set password")?;
        if done.rows_affected() == 0 {
            return Err(ApiError::not_found("user"));
        }
        Ok(())
    }

    async fn list_following(
        &self,
        user: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<User>), ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE user_id = $1")
            .bind(user)
            .fetch_one(&self.db)
            .await
            .context("count follows")?;
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM follows f
              JOIN users u ON u.id = f.author_id
             WHERE f.user_id = $1
             ORDER BY u.username
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list follows")?;
        Ok((count, users))
    }
}
