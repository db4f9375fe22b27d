use anyhow::Context;
use async_trait::async_trait;

use super::repo_types::{Ingredient, Tag};
use crate::{
    db::{contains_pattern, PgRepo},
    error::ApiError,
};

/// Read-only tag and ingredient reference data.
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError>;
    async fn get_tag(&self, id: i64) -> Result<Option<Tag>, ApiError>;
    /// Ingredients ordered by name; `name` is a case-insensitive substring filter.
    async fn search_ingredients(&self, name: Option<&str>) -> Result<Vec<Ingredient>, ApiError>;
    async fn get_ingredient(&self, id: i64) -> Result<Option<Ingredient>, ApiError>;
}

#[async_trait]
impl CatalogRepo for PgRepo {
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        let rows = sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, name, color, slug
              FROM tags
             ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list tags")?;
        Ok(rows)
    }

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>, ApiError> {
        let row = sqlx::query_as::<_, Tag>(
            r#"SELECT id, name, color, slug FROM tags WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get tag")?;
        Ok(row)
    }

    async fn search_ingredients(&self, name: Option<&str>) -> Result<Vec<Ingredient>, ApiError> {
        let rows = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(needle) => sqlx::query_as::<_, Ingredient>(
                r#"
                SELECT id, name, measurement_unit
                  FROM ingredients
                 WHERE name ILIKE $1 ESCAPE '\'
                 ORDER BY name, id
                "#,
            )
            .bind(contains_pattern(needle))
            .fetch_all(&self.db)
            .await,
            None => sqlx::query_as::<_, Ingredient>(
                r#"
                SELECT id, name, measurement_unit
                  FROM ingredients
                 ORDER BY name, id
                "#,
            )
            .fetch_all(&self.db)
            .await,
        }
        .context("search ingredients")?;
        Ok(rows)
    }

    async fn get_ingredient(&self, id: i64) -> Result<Option<Ingredient>, ApiError> {
        let row = sqlx::query_as::<_, Ingredient>(
            r#"SELECT id, name, measurement_unit FROM ingredients WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get ingredient")?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pg_ingredient, pg_repo, unique};

    #[tokio::test]
    async fn migrations_seed_tags_and_ingredients() {
        let Some(repo) = pg_repo().await else { return };

        let slugs: Vec<String> = repo
            .list_tags()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.slug)
            .collect();
        for slug in ["breakfast", "lunch", "dinner"] {
            assert!(slugs.iter().any(|s| s == slug), "{slug} missing from {slugs:?}");
        }

        let flours = repo.search_ingredients(Some("FLOUR")).await.unwrap();
        for name in ["all-purpose flour", "wholemeal flour", "rye flour"] {
            assert!(flours.iter().any(|i| i.name == name && i.measurement_unit == "g"));
        }
        assert!(flours.iter().all(|i| i.name.to_lowercase().contains("flour")));
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let Some(repo) = pg_repo().await else { return };
        let marker = unique("pct");
        let literal = format!("{marker} 100%_pure");
        let id = pg_ingredient(&repo, &literal, "ml").await;
        pg_ingredient(&repo, &format!("{marker} 100 pure"), "ml").await;

        let found = repo.search_ingredients(Some(&format!("{marker} 100%_"))).await.unwrap();
        assert_eq!(found.iter().map(|i| i.id).collect::<Vec<_>>(), vec![id]);
        assert_eq!(repo.get_ingredient(id).await.unwrap().unwrap().name, literal);
        assert!(repo.get_ingredient(i64::MAX).await.unwrap().is_none());
    }
}
