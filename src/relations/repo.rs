use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::PgRepo,
    error::{is_unique_violation, ApiError},
};

/// The two per-user recipe lists. Both are unique per (user, recipe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            Self::Favorites => "favorites",
            Self::ShoppingCart => "shopping_cart",
        }
    }

    pub fn duplicate_message(self) -> &'static str {
        match self {
            Self::Favorites => "recipe is already in favorites",
            Self::ShoppingCart => "recipe is already in the shopping cart",
        }
    }

    pub fn missing_message(self) -> &'static str {
        match self {
            Self::Favorites => "recipe is not in favorites",
            Self::ShoppingCart => "recipe is not in the shopping cart",
        }
    }
}

pub const ALREADY_FOLLOWING: &str = "already subscribed to this author";
pub const NOT_FOLLOWING: &str = "not subscribed to this author";

#[async_trait]
pub trait RelationRepo: Send + Sync {
    async fn contains(&self, list: RecipeList, user: Uuid, recipe: i64) -> Result<bool, ApiError>;
    /// A unique-constraint hit is reported as [`ApiError::Duplicate`].
    async fn insert(&self, list: RecipeList, user: Uuid, recipe: i64) -> Result<(), ApiError>;
    /// Returns false when there was nothing to delete.
    async fn remove(&self, list: RecipeList, user: Uuid, recipe: i64) -> Result<bool, ApiError>;
    /// Subset of `recipes` that `user` has on `list`.
    async fn marked(
        &self,
        list: RecipeList,
        user: Uuid,
        recipes: &[i64],
    ) -> Result<HashSet<i64>, ApiError>;

    async fn is_following(&self, user: Uuid, author: Uuid) -> Result<bool, ApiError>;
    async fn follow(&self, user: Uuid, author: Uuid) -> Result<(), ApiError>;
    async fn unfollow(&self, user: Uuid, author: Uuid) -> Result<bool, ApiError>;
    /// Subset of `authors` followed by `user`.
    async fn followed_among(&self, user: Uuid, authors: &[Uuid])
        -> Result<HashSet<Uuid>, ApiError>;
}

#[async_trait]
impl RelationRepo for PgRepo {
    async fn contains(&self, list: RecipeList, user: Uuid, recipe: i64) -> Result<bool, ApiError> {
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE user_id = $1 AND recipe_id = $2)",
            list.table()
        ))
        .bind(user)
        .bind(recipe)
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("check {}", list.table()))?;
        Ok(exists)
    }

    async fn insert(&self, list: RecipeList, user: Uuid, recipe: i64) -> Result<(), ApiError> {
        let result = sqlx::query(&format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2)",
            list.table()
        ))
        .bind(user)
        .bind(recipe)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(ApiError::Duplicate(list.duplicate_message().into()))
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("insert into {}", list.table()))
                .into()),
        }
    }

    async fn remove(&self, list: RecipeList, user: Uuid, recipe: i64) -> Result<bool, ApiError> {
        let done = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            list.table()
        ))
        .bind(user)
        .bind(recipe)
        .execute(&self.db)
        .await
        .with_context(|| format!("delete from {}", list.table()))?;
        Ok(done.rows_affected() > 0)
    }

    async fn marked(
        &self,
        list: RecipeList,
        user: Uuid,
        recipes: &[i64],
    ) -> Result<HashSet<i64>, ApiError> {
        if recipes.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<i64> = sqlx::query_scalar(&format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
            list.table()
        ))
        .bind(user)
        .bind(recipes)
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("select marked from {}", list.table()))?;
        Ok(ids.into_iter().collect())
    }

    async fn is_following(&self, user: Uuid, author: Uuid) -> Result<bool, ApiError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user)
        .bind(author)
        .fetch_one(&self.db)
        .await
        .context("check follow")?;
        Ok(exists)
    }

    async fn follow(&self, user: Uuid, author: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("INSERT INTO follows (user_id, author_id) VALUES ($1, $2)")
            .bind(user)
            .bind(author)
            .execute(&self.db)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ApiError::Duplicate(ALREADY_FOLLOWING.into())),
            Err(e) => Err(anyhow::Error::new(e).context("insert follow").into()),
        }
    }

    async fn unfollow(&self, user: Uuid, author: Uuid) -> Result<bool, ApiError> {
        let done = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user)
            .bind(author)
            .execute(&self.db)
            .await
            .context("delete follow")?;
        Ok(done.rows_affected() > 0)
    }

    async fn followed_among(
        &self,
        user: Uuid,
        authors: &[Uuid],
    ) -> Result<HashSet<Uuid>, ApiError> {
        if authors.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT author_id FROM follows WHERE user_id = $1 AND author_id = ANY($2)",
        )
        .bind(user)
        .bind(authors)
        .fetch_all(&self.db)
        .await
        .context("select followed authors")?;
        Ok(ids.into_iter().collect())
    }
}
