use tracing::info;
use uuid::Uuid;

use super::{
    dto::SubscriptionView,
    repo::{RecipeList, ALREADY_FOLLOWING, NOT_FOLLOWING},
};
use crate::{
    error::ApiError,
    pagination::{Page, PageWindow},
    recipes::{self, dto::RecipeShort},
    state::AppState,
    users::{self, repo_types::User},
};

/// Adds a recipe to the user's favorites or cart and returns its short form.
pub async fn add_recipe(
    st: &AppState,
    list: RecipeList,
    user: Uuid,
    recipe_id: i64,
) -> Result<RecipeShort, ApiError> {
    let row = st
        .recipes
        .get_row(recipe_id)
        .await?
        .ok_or_else(|| ApiError::not_found("recipe"))?;
    if st.relations.contains(list, user, recipe_id).await? {
        return Err(ApiError::Duplicate(list.duplicate_message().into()));
    }
    st.relations.insert(list, user, recipe_id).await?;
    info!(?list, %user, recipe_id, "recipe added");
    recipes::services::short(st, &row).await
}

pub async fn remove_recipe(
    st: &AppState,
    list: RecipeList,
    user: Uuid,
    recipe_id: i64,
) -> Result<(), ApiError> {
    if st.recipes.get_row(recipe_id).await?.is_none() {
        return Err(ApiError::not_found("recipe"));
    }
    if !st.relations.remove(list, user, recipe_id).await? {
        return Err(ApiError::NotFound(list.missing_message().into()));
    }
    info!(?list, %user, recipe_id, "recipe removed");
    Ok(())
}

fn ensure_not_self(user: Uuid, author: Uuid) -> Result<(), ApiError> {
    if user == author {
        return Err(ApiError::SelfReference(
            "you cannot subscribe to yourself".into(),
        ));
    }
    Ok(())
}

async fn author(st: &AppState, id: Uuid) -> Result<User, ApiError> {
    st.users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))
}

/// Author card as seen by a follower: always subscribed, with a recipe
/// preview truncated to `recipes_limit`.
async fn subscription_view(
    st: &AppState,
    author: User,
    recipes_limit: Option<u32>,
) -> Result<SubscriptionView, ApiError> {
    let rows = st
        .recipes
        .by_author(author.id, recipes_limit.map(i64::from))
        .await?;
    let recipes_count = st.recipes.count_by_author(author.id).await?;
    let mut recipes = Vec::with_capacity(rows.len());
    for row in &rows {
        recipes.push(recipes::services::short(st, row).await?);
    }
    Ok(SubscriptionView {
        author: users::services::view(author, true),
        recipes,
        recipes_count,
    })
}

pub async fn subscribe(
    st: &AppState,
    user: Uuid,
    author_id: Uuid,
    recipes_limit: Option<u32>,
) -> Result<SubscriptionView, ApiError> {
    let author = author(st, author_id).await?;
    ensure_not_self(user, author_id)?;
    if st.relations.is_following(user, author_id).await? {
        return Err(ApiError::Duplicate(ALREADY_FOLLOWING.into()));
    }
    st.relations.follow(user, author_id).await?;
    info!(%user, author = %author_id, "subscribed");
    subscription_view(st, author, recipes_limit).await
}

pub async fn unsubscribe(st: &AppState, user: Uuid, author_id: Uuid) -> Result<(), ApiError> {
    author(st, author_id).await?;
    ensure_not_self(user, author_id)?;
    if !st.relations.unfollow(user, author_id).await? {
        return Err(ApiError::NotFound(NOT_FOLLOWING.into()));
    }
    info!(%user, author = %author_id, "unsubscribed");
    Ok(())
}

/// Authors `user` follows, one page at a time.
pub async fn subscriptions(
    st: &AppState,
    user: Uuid,
    window: PageWindow,
    recipes_limit: Option<u32>,
) -> Result<Page<SubscriptionView>, ApiError> {
    let (count, authors) = st
        .users
        .list_following(user, window.limit(), window.offset())
        .await?;
    let mut results = Vec::with_capacity(authors.len());
    for author in authors {
        results.push(subscription_view(st, author, recipes_limit).await?);
    }
    Ok(Page::new(window, count, results))
}
