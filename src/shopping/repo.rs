use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{db::PgRepo, error::ApiError};

/// One aggregated line of the shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

#[async_trait]
pub trait ShoppingRepo: Send + Sync {
    /// Ingredients of every recipe in the user's cart, grouped by
    /// (name, unit) and summed, ordered by name.
    async fn shopping_list(&self, user: Uuid) -> Result<Vec<ShoppingItem>, ApiError>;
}

#[async_trait]
impl ShoppingRepo for PgRepo {
    async fn shopping_list(&self, user: Uuid) -> Result<Vec<ShoppingItem>, ApiError> {
        let items = sqlx::query_as::<_, ShoppingItem>(
            r#"
            SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS total_amount
              FROM shopping_cart sc
              JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
              JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE sc.user_id = $1
             GROUP BY i.name, i.measurement_unit
             ORDER BY i.name
            "#,
        )
        .bind(user)
        .fetch_all(&self.db)
        .await
        .context("aggregate shopping list")?;
        Ok(items)
    }
}
