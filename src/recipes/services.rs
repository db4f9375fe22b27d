use std::collections::{HashMap, HashSet};

use anyhow::anyhow;
use tracing::info;
use uuid::Uuid;

use super::{
    dto::{IngredientAmountView, RecipeRead, RecipeShort, RecipeWriteRequest},
    filters::RecipeQuery,
    form::RecipeForm,
    image,
    repo_types::{IngredientAmount, NewRecipe, RecipeAggregate, RecipeRow, RecipeUpdate},
};
use crate::{
    error::ApiError,
    pagination::Page,
    relations::repo::RecipeList,
    state::AppState,
    users,
};

const MAX_NAME_LEN: usize = 200;
const MAX_COOKING_TIME: i64 = 32_767;

/// Which write a payload is validated for. Creates need every field; updates
/// may omit scalars but always resend tags and ingredients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

fn required<T>(value: Option<T>, field: &str, mode: WriteMode) -> Result<Option<T>, ApiError> {
    match (value, mode) {
        (None, WriteMode::Create) => Err(ApiError::validation(field, "field is required")),
        (value, _) => Ok(value),
    }
}

fn text_field(
    value: Option<&String>,
    field: &str,
    mode: WriteMode,
    max_len: Option<usize>,
) -> Result<Option<String>, ApiError> {
    let Some(value) = required(value, field, mode)? else {
        return Ok(None);
    };
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(field, "may not be blank"));
    }
    if let Some(max) = max_len {
        if value.chars().count() > max {
            return Err(ApiError::validation(
                field,
                format!("at most {max} characters"),
            ));
        }
    }
    Ok(Some(value.to_string()))
}

/// Field-level checks; nothing is written when this fails.
pub fn validate(req: &RecipeWriteRequest, mode: WriteMode) -> Result<RecipeUpdate, ApiError> {
    let name = text_field(req.name.as_ref(), "name", mode, Some(MAX_NAME_LEN))?;
    let text = text_field(req.text.as_ref(), "text", mode, None)?;

    let cooking_time = match required(req.cooking_time, "cooking_time", mode)? {
        Some(t) if t < 1 => return Err(ApiError::validation("cooking_time", "must be at least 1")),
        Some(t) if t > MAX_COOKING_TIME => {
            return Err(ApiError::validation(
                "cooking_time",
                format!("must be at most {MAX_COOKING_TIME}"),
            ))
        }
        Some(t) => Some(t as i32),
        None => None,
    };

    let tags = req
        .tags
        .clone()
        .ok_or_else(|| ApiError::validation("tags", "field is required"))?;
    if tags.is_empty() {
        return Err(ApiError::validation("tags", "at least one tag is required"));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = tags.iter().find(|id| !seen.insert(**id)) {
        return Err(ApiError::validation("tags", format!("duplicate tag {dup}")));
    }

    let lines = req
        .ingredients
        .as_ref()
        .ok_or_else(|| ApiError::validation("ingredients", "field is required"))?;
    if lines.is_empty() {
        return Err(ApiError::validation(
            "ingredients",
            "at least one ingredient is required",
        ));
    }
    let mut seen = HashSet::new();
    let mut ingredients = Vec::with_capacity(lines.len());
    for line in lines {
        if line.amount < 1 {
            return Err(ApiError::validation("ingredients", "amount must be at least 1"));
        }
        let amount = i32::try_from(line.amount)
            .map_err(|_| ApiError::validation("ingredients", "amount is too large"))?;
        if !seen.insert(line.id) {
            return Err(ApiError::validation(
                "ingredients",
                format!("duplicate ingredient {}", line.id),
            ));
        }
        ingredients.push(IngredientAmount {
            ingredient_id: line.id,
            amount,
        });
    }

    Ok(RecipeUpdate {
        name,
        text,
        cooking_time,
        image: None,
        tags,
        ingredients,
    })
}

fn into_new(fields: RecipeUpdate, image: String) -> Result<NewRecipe, ApiError> {
    Ok(NewRecipe {
        name: fields
            .name
            .ok_or_else(|| ApiError::validation("name", "field is required"))?,
        text: fields
            .text
            .ok_or_else(|| ApiError::validation("text", "field is required"))?,
        cooking_time: fields
            .cooking_time
            .ok_or_else(|| ApiError::validation("cooking_time", "field is required"))?,
        image,
        tags: fields.tags,
        ingredients: fields.ingredients,
    })
}

pub async fn short(st: &AppState, row: &RecipeRow) -> Result<RecipeShort, ApiError> {
    Ok(RecipeShort {
        id: row.id,
        name: row.name.clone(),
        image: image::url(st, &row.image).await?,
        cooking_time: row.cooking_time,
    })
}

/// Read representation of `recipes` as seen by `viewer`.
pub async fn present(
    st: &AppState,
    viewer: Option<Uuid>,
    recipes: Vec<RecipeAggregate>,
) -> Result<Vec<RecipeRead>, ApiError> {
    let mut author_ids: Vec<Uuid> = recipes.iter().map(|r| r.recipe.author_id).collect();
    author_ids.sort();
    author_ids.dedup();
    let authors = st.users.find_many(&author_ids).await?;
    let authors: HashMap<Uuid, _> = users::services::present(st, viewer, authors)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let ids: Vec<i64> = recipes.iter().map(|r| r.recipe.id).collect();
    let (favorites, cart) = match viewer {
        Some(viewer) => (
            st.relations.marked(RecipeList::Favorites, viewer, &ids).await?,
            st.relations.marked(RecipeList::ShoppingCart, viewer, &ids).await?,
        ),
        None => Default::default(),
    };

    let mut out = Vec::with_capacity(recipes.len());
    for RecipeAggregate {
        recipe,
        tags,
        ingredients,
    } in recipes
    {
        let author = authors
            .get(&recipe.author_id)
            .cloned()
            .ok_or_else(|| anyhow!("recipe {} has no author row", recipe.id))?;
        out.push(RecipeRead {
            id: recipe.id,
            tags,
            author,
            ingredients: ingredients
                .into_iter()
                .map(|l| IngredientAmountView {
                    id: l.ingredient_id,
                    name: l.name,
                    measurement_unit: l.measurement_unit,
                    amount: l.amount,
                })
                .collect(),
            is_favorited: favorites.contains(&recipe.id),
            is_in_shopping_cart: cart.contains(&recipe.id),
            image: image::url(st, &recipe.image).await?,
            name: recipe.name,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        });
    }
    Ok(out)
}

pub async fn list_recipes(
    st: &AppState,
    viewer: Option<Uuid>,
    query: RecipeQuery,
) -> Result<Page<RecipeRead>, ApiError> {
    let window = query.page_query().resolve(st.config.page_size);
    let Some(filter) = query.into_filter(viewer) else {
        return Ok(Page::empty(window));
    };
    let (count, recipes) = st
        .recipes
        .list(&filter, window.limit(), window.offset())
        .await?;
    Ok(Page::new(window, count, present(st, viewer, recipes).await?))
}

pub async fn get_recipe(
    st: &AppState,
    viewer: Option<Uuid>,
    id: i64,
) -> Result<RecipeRead, ApiError> {
    let recipe = st
        .recipes
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("recipe"))?;
    present(st, viewer, vec![recipe])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("recipe"))
}

pub async fn create_recipe(
    st: &AppState,
    author: Uuid,
    form: RecipeForm,
) -> Result<RecipeRead, ApiError> {
    let fields = validate(&form.body, WriteMode::Create)?;
    let upload = form
        .image()?
        .ok_or_else(|| ApiError::validation("image", "field is required"))?;
    let key = image::store(st, upload).await?;

    let created = match into_new(fields, key.clone()) {
        Ok(recipe) => st.recipes.create(author, &recipe).await,
        Err(e) => Err(e),
    };
    let id = match created {
        Ok(id) => id,
        Err(e) => {
            image::discard(st, &key).await;
            return Err(e);
        }
    };

    info!(recipe_id = id, %author, "recipe created");
    get_recipe(st, Some(author), id).await
}

async fn owned_row(st: &AppState, user: Uuid, id: i64) -> Result<RecipeRow, ApiError> {
    let row = st
        .recipes
        .get_row(id)
        .await?
        .ok_or_else(|| ApiError::not_found("recipe"))?;
    if row.author_id != user {
        return Err(ApiError::Forbidden(
            "only the author can change this recipe".into(),
        ));
    }
    Ok(row)
}

pub async fn update_recipe(
    st: &AppState,
    user: Uuid,
    id: i64,
    form: RecipeForm,
) -> Result<RecipeRead, ApiError> {
    let row = owned_row(st, user, id).await?;
    let mut changes = validate(&form.body, WriteMode::Update)?;

    let new_key = match form.image()? {
        Some(upload) => Some(image::store(st, upload).await?),
        None => None,
    };
    changes.image = new_key.clone();

    if let Err(e) = st.recipes.update(id, &changes).await {
        if let Some(key) = &new_key {
            image::discard(st, key).await;
        }
        return Err(e);
    }
    if new_key.is_some() {
        image::discard(st, &row.image).await;
    }

    info!(recipe_id = id, %user, "recipe updated");
    get_recipe(st, Some(user), id).await
}

pub async fn delete_recipe(st: &AppState, user: Uuid, id: i64) -> Result<(), ApiError> {
    let row = owned_row(st, user, id).await?;
    if !st.recipes.delete(id).await? {
        return Err(ApiError::not_found("recipe"));
    }
    image::discard(st, &row.image).await;
    info!(recipe_id = id, %user, "recipe deleted");
    Ok(())
}
