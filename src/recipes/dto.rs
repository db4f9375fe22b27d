use serde::{Deserialize, Serialize};

use crate::{catalog::repo_types::Tag, users::dto::UserView};

/// Write shape of a recipe: identifiers only. Every field is optional at the
/// wire level so that missing fields surface as field validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeWriteRequest {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
    /// `data:image/<ext>;base64,<payload>`
    pub image: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<IngredientAmountRequest>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IngredientAmountRequest {
    pub id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientAmountView {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Read shape of a recipe, returned by every recipe endpoint including writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeRead {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<IngredientAmountView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Short projection used by favorites, cart and subscription previews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeShort {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}
