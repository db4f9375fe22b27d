use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::repo_types::Tag;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub author_id: Uuid,
    pub name: String,
    pub image: String, // object store key
    pub text: String,
    pub cooking_time: i32,
    pub created_at: OffsetDateTime,
}

/// One ingredient line of a recipe, denormalized with the catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IngredientLine {
    pub recipe_id: i64,
    pub ingredient_id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct TagLine {
    pub recipe_id: i64,
    #[sqlx(flatten)]
    pub tag: Tag,
}

/// A recipe with its tag set (submission order) and ingredient lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeAggregate {
    pub recipe: RecipeRow,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<IngredientLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub ingredient_id: i64,
    pub amount: i32,
}

/// Fully validated input of a create.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub tags: Vec<i64>,
    pub ingredients: Vec<IngredientAmount>,
}

/// Validated input of an update. `None` keeps the stored value; tags and
/// ingredients always replace the stored sets.
#[derive(Debug, Clone, Default)]
pub struct RecipeUpdate {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub tags: Vec<i64>,
    pub ingredients: Vec<IngredientAmount>,
}
