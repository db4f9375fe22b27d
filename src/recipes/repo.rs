use std::collections::{HashMap, HashSet};

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{
    filters::{push_conditions, RecipeFilter},
    repo_types::{
        IngredientAmount, IngredientLine, NewRecipe, RecipeAggregate, RecipeRow, RecipeUpdate,
        TagLine,
    },
};
use crate::{db::PgRepo, error::ApiError};

#[async_trait]
pub trait RecipeRepo: Send + Sync {
    /// Total matching count plus one page, newest first.
    async fn list(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<RecipeAggregate>), ApiError>;
    async fn get(&self, id: i64) -> Result<Option<RecipeAggregate>, ApiError>;
    async fn get_row(&self, id: i64) -> Result<Option<RecipeRow>, ApiError>;
    /// Recipe row, tags and ingredient lines in one transaction.
    async fn create(&self, author: Uuid, recipe: &NewRecipe) -> Result<i64, ApiError>;
    /// Scalar changes plus full replacement of tags and ingredient lines, in
    /// one transaction.
    async fn update(&self, id: i64, changes: &RecipeUpdate) -> Result<(), ApiError>;
    async fn delete(&self, id: i64) -> Result<bool, ApiError>;
    /// Newest first, truncated to `limit` when given.
    async fn by_author(&self, author: Uuid, limit: Option<i64>)
        -> Result<Vec<RecipeRow>, ApiError>;
    async fn count_by_author(&self, author: Uuid) -> Result<i64, ApiError>;
}

const RECIPE_COLUMNS: &str = "r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.created_at";

impl PgRepo {
    async fn load_aggregates(&self, rows: Vec<RecipeRow>) -> Result<Vec<RecipeAggregate>, ApiError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

        let tag_lines = sqlx::query_as::<_, TagLine>(
            r#"
            SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
              FROM recipe_tags rt
              JOIN tags t ON t.id = rt.tag_id
             WHERE rt.recipe_id = ANY($1)
             ORDER BY rt.recipe_id, rt.position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await
        .context("load recipe tags")?;

        let ingredient_lines = sqlx::query_as::<_, IngredientLine>(
            r#"
            SELECT ri.recipe_id, ri.ingredient_id, i.name, i.measurement_unit, ri.amount
              FROM recipe_ingredients ri
              JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE ri.recipe_id = ANY($1)
             ORDER BY ri.recipe_id, i.name, ri.ingredient_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await
        .context("load recipe ingredients")?;

        let mut tags: HashMap<i64, Vec<_>> = HashMap::new();
        for line in tag_lines {
            tags.entry(line.recipe_id).or_default().push(line.tag);
        }
        let mut ingredients: HashMap<i64, Vec<_>> = HashMap::new();
        for line in ingredient_lines {
            ingredients.entry(line.recipe_id).or_default().push(line);
        }

        Ok(rows
            .into_iter()
            .map(|recipe| RecipeAggregate {
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                recipe,
            })
            .collect())
    }
}

/// Ids from `wanted` that are absent from `table`.
async fn missing_ids(
    tx: &mut Transaction<'_, Postgres>,
    table: &'static str,
    wanted: &[i64],
) -> Result<Vec<i64>, ApiError> {
    let found: Vec<i64> = sqlx::query_scalar(&format!(
        "SELECT id FROM {table} WHERE id = ANY($1)"
    ))
    .bind(wanted)
    .fetch_all(&mut **tx)
    .await
    .with_context(|| format!("check {table} ids"))?;
    let found: HashSet<i64> = found.into_iter().collect();
    Ok(wanted.iter().copied().filter(|id| !found.contains(id)).collect())
}

async fn attach_tags(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    tags: &[i64],
) -> Result<(), ApiError> {
    if let Some(id) = missing_ids(tx, "tags", tags).await?.first() {
        return Err(ApiError::NotFound(format!("tag {id} not found")));
    }
    sqlx::query(
        r#"
        INSERT INTO recipe_tags (recipe_id, tag_id, position)
        SELECT $1, t.id, t.ord::INTEGER
          FROM UNNEST($2::BIGINT[]) WITH ORDINALITY AS t(id, ord)
        "#,
    )
    .bind(recipe_id)
    .bind(tags)
    .execute(&mut **tx)
    .await
    .context("insert recipe tags")?;
    Ok(())
}

async fn attach_ingredients(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    lines: &[IngredientAmount],
) -> Result<(), ApiError> {
    let ids: Vec<i64> = lines.iter().map(|l| l.ingredient_id).collect();
    if let Some(id) = missing_ids(tx, "ingredients", &ids).await?.first() {
        return Err(ApiError::NotFound(format!("ingredient {id} not found")));
    }
    let amounts: Vec<i32> = lines.iter().map(|l| l.amount).collect();
    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, l.id, l.amount
          FROM UNNEST($2::BIGINT[], $3::INTEGER[]) AS l(id, amount)
        "#,
    )
    .bind(recipe_id)
    .bind(&ids)
    .bind(&amounts)
    .execute(&mut **tx)
    .await
    .context("insert recipe ingredients")?;
    Ok(())
}

#[async_trait]
impl RecipeRepo for PgRepo {
    async fn list(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<RecipeAggregate>), ApiError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
        push_conditions(&mut count_qb, filter);
        let count: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .context("count recipes")?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE TRUE"
        ));
        push_conditions(&mut qb, filter);
        qb.push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = qb
            .build_query_as::<RecipeRow>()
            .fetch_all(&self.db)
            .await
            .context("list recipes")?;

        Ok((count, self.load_aggregates(rows).await?))
    }

    async fn get(&self, id: i64) -> Result<Option<RecipeAggregate>, ApiError> {
        let Some(row) = self.get_row(id).await? else {
            return Ok(None);
        };
        Ok(self.load_aggregates(vec![row]).await?.pop())
    }

    async fn get_row(&self, id: i64) -> Result<Option<RecipeRow>, ApiError> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get recipe")?;
        Ok(row)
    }

    async fn create(&self, author: Uuid, recipe: &NewRecipe) -> Result<i64, ApiError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO recipes (author_id, name, image, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(author)
        .bind(&recipe.name)
        .bind(&recipe.image)
        .bind(&recipe.text)
        .bind(recipe.cooking_time)
        .fetch_one(&mut *tx)
        .await
        .context("insert recipe")?;

        attach_tags(&mut tx, id, &recipe.tags).await?;
        attach_ingredients(&mut tx, id, &recipe.ingredients).await?;

        tx.commit().await.context("commit tx")?;
        Ok(id)
    }

    async fn update(&self, id: i64, changes: &RecipeUpdate) -> Result<(), ApiError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let done = sqlx::query(
            r#"
            UPDATE recipes
               SET name = COALESCE($2, name),
                   text = COALESCE($3, text),
                   cooking_time = COALESCE($4, cooking_time),
                   image = COALESCE($5, image)
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.text.as_deref())
        .bind(changes.cooking_time)
        .bind(changes.image.as_deref())
        .execute(&mut *tx)
        .await
        .context("update recipe")?;
        if done.rows_affected() == 0 {
            return Err(ApiError::not_found("recipe"));
        }

        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("clear recipe tags")?;
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("clear recipe ingredients")?;

        attach_tags(&mut tx, id, &changes.tags).await?;
        attach_ingredients(&mut tx, id, &changes.ingredients).await?;

        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, ApiError> {
        let done = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete recipe")?;
        Ok(done.rows_affected() > 0)
    }

    async fn by_author(
        &self,
        author: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<RecipeRow>, ApiError> {
        // LIMIT NULL means no limit in Postgres
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            r#"
            SELECT {RECIPE_COLUMNS}
              FROM recipes r
             WHERE r.author_id = $1
             ORDER BY r.created_at DESC, r.id DESC
             LIMIT $2
            "#
        ))
        .bind(author)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list recipes by author")?;
        Ok(rows)
    }

    async fn count_by_author(&self, author: Uuid) -> Result<i64, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author)
            .fetch_one(&self.db)
            .await
            .context("count recipes by author")?;
        Ok(count)
    }
}
