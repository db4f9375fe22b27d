use uuid::Uuid;

use super::{dto::UserView, repo_types::User};
use crate::{
    auth::password::{hash_password, verify_password, MIN_PASSWORD_LEN},
    error::ApiError,
    pagination::{Page, PageWindow},
    state::AppState,
};

pub fn view(user: User, is_subscribed: bool) -> UserView {
    UserView {
        email: user.email,
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed,
    }
}

/// Users as seen by `viewer`; anonymous viewers are subscribed to nobody.
pub async fn present(
    st: &AppState,
    viewer: Option<Uuid>,
    users: Vec<User>,
) -> Result<Vec<UserView>, ApiError> {
    let followed = match viewer {
        Some(viewer) => {
            let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
            st.relations.followed_among(viewer, &ids).await?
        }
        None => Default::default(),
    };
    Ok(users
        .into_iter()
        .map(|u| {
            let subscribed = followed.contains(&u.id);
            view(u, subscribed)
        })
        .collect())
}

pub async fn list_users(
    st: &AppState,
    viewer: Option<Uuid>,
    window: PageWindow,
) -> Result<Page<UserView>, ApiError> {
    let (count, users) = st.users.list(window.limit(), window.offset()).await?;
    Ok(Page::new(window, count, present(st, viewer, users).await?))
}

pub async fn get_user(
    st: &AppState,
    viewer: Option<Uuid>,
    id: Uuid,
) -> Result<UserView, ApiError> {
    let user = st
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    let subscribed = match viewer {
        Some(viewer) => st.relations.is_following(viewer, user.id).await?,
        None => false,
    };
    Ok(view(user, subscribed))
}

pub async fn set_password(
    st: &AppState,
    user_id: Uuid,
    current: &str,
    new: &str,
) -> Result<(), ApiError> {
    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    if !verify_password(current, &user.password_hash)? {
        return Err(ApiError::validation("current_password", "wrong password"));
    }
    if new.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("new_password", "password too short"));
    }
    let hash = hash_password(new)?;
    st.users.set_password(user_id, &hash).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::PageQuery;
    use crate::testing::MemoryStore;

    #[tokio::test]
    async fn is_subscribed_follows_the_viewer() {
        let (state, store) = MemoryStore::state();
        let fan = store.add_user("fan");
        let chef = store.add_user("chef");
        store.put_follow(fan, chef);

        let seen_by_fan = get_user(&state, Some(fan), chef).await.unwrap();
        assert!(seen_by_fan.is_subscribed);
        let seen_by_chef = get_user(&state, Some(chef), fan).await.unwrap();
        assert!(!seen_by_chef.is_subscribed);
        let anonymous = get_user(&state, None, chef).await.unwrap();
        assert!(!anonymous.is_subscribed);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (state, _) = MemoryStore::state();
        let err = get_user(&state, None, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn users_are_paginated() {
        let (state, store) = MemoryStore::state();
        for name in ["a", "b", "c"] {
            store.add_user(name);
        }
        let window = PageQuery { page: Some(2), limit: Some(2) }.resolve(6);
        let page = list_users(&state, None, window).await.unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].username, "c");
        assert_eq!(page.previous, Some(1));
        assert_eq!(page.next, None);
    }

    #[tokio::test]
    async fn set_password_checks_current_one() {
        let (state, store) = MemoryStore::state();
        let user = store.add_user("cook");

        let err = set_password(&state, user, "not-it", "brand-new-pass")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation { ref field, .. } if field == "current_password"));

        set_password(&state, user, crate::testing::PASSWORD, "brand-new-pass")
            .await
            .unwrap();
        let stored = state.users.find_by_id(user).await.unwrap().unwrap();
        assert!(verify_password("brand-new-pass", &stored.password_hash).unwrap());
    }
}
