use serde::{Deserialize, Serialize};

use crate::{pagination::PageQuery, recipes::dto::RecipeShort, users::dto::UserView};

/// A followed author with a preview of their recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserView,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

/// `?page=&limit=&recipes_limit=`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub recipes_limit: Option<u32>,
}

impl SubscriptionQuery {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Body-less subscribe call; only `recipes_limit` is read.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RecipesLimit {
    pub recipes_limit: Option<u32>,
}
