use serde::{de, Deserialize, Deserializer};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::pagination::PageQuery;

/// Query string of `GET /recipes`. `tags` may repeat.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    #[serde(default, deserialize_with = "flag")]
    pub is_favorited: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_in_shopping_cart: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Resolved recipe list restrictions. Every set field narrows the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    /// Lowercased slugs, matched with OR.
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub favorited_by: Option<Uuid>,
    pub in_cart_of: Option<Uuid>,
}

impl RecipeQuery {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    /// `None` means the result is empty: an anonymous viewer asked for their
    /// favorites or cart.
    pub fn into_filter(self, viewer: Option<Uuid>) -> Option<RecipeFilter> {
        if (self.is_favorited || self.is_in_shopping_cart) && viewer.is_none() {
            return None;
        }
        let mut tags: Vec<String> = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();

        Some(RecipeFilter {
            tags,
            author: self.author,
            favorited_by: viewer.filter(|_| self.is_favorited),
            in_cart_of: viewer.filter(|_| self.is_in_shopping_cart),
        })
    }
}

/// Appends `AND ...` conditions on the `recipes r` alias.
pub fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter) {
    if !filter.tags.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND lower(t.slug) = ANY(",
        )
        .push_bind(filter.tags.clone())
        .push("))");
    }
    if let Some(author) = filter.author {
        qb.push(" AND r.author_id = ").push_bind(author);
    }
    if let Some(user) = filter.favorited_by {
        qb.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
            .push_bind(user)
            .push(")");
    }
    if let Some(user) = filter.in_cart_of {
        qb.push(
            " AND EXISTS (SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ",
        )
        .push_bind(user)
        .push(")");
    }
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        other => Err(de::Error::custom(format!("invalid boolean flag: {other}"))),
    }
}
