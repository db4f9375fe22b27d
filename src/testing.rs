//! In-memory backend for service and router tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use sqlx::postgres::PgPoolOptions;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::password::hash_password,
    catalog::{
        repo::CatalogRepo,
        repo_types::{Ingredient, Tag},
    },
    config::{AppConfig, JwtConfig, StorageConfig},
    db::PgRepo,
    error::ApiError,
    recipes::{
        filters::RecipeFilter,
        repo::RecipeRepo,
        repo_types::{
            IngredientAmount, IngredientLine, NewRecipe, RecipeAggregate, RecipeRow, RecipeUpdate,
        },
    },
    relations::repo::{RecipeList, RelationRepo, ALREADY_FOLLOWING},
    shopping::repo::{ShoppingItem, ShoppingRepo},
    state::AppState,
    storage::StorageClient,
    users::{
        repo::UserRepo,
        repo_types::{NewUser, User},
    },
};

pub const PASSWORD: &str = "kitchen-secret-1";
pub const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgo=";

lazy_static! {
    // argon2 is slow in debug builds, hash once
    static ref PASSWORD_HASH: String = hash_password(PASSWORD).unwrap();
}

struct StoredRecipe {
    row: RecipeRow,
    tags: Vec<i64>,
    ingredients: Vec<IngredientAmount>,
}

#[derive(Default)]
struct Data {
    users: Vec<User>,
    tags: Vec<Tag>,
    ingredients: Vec<Ingredient>,
    recipes: Vec<StoredRecipe>,
    favorites: HashSet<(Uuid, i64)>,
    cart: HashSet<(Uuid, i64)>,
    follows: HashSet<(Uuid, Uuid)>,
    objects: HashSet<String>,
    seq: i64,
}

impl Data {
    fn next_id(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }

    fn list(&mut self, list: RecipeList) -> &mut HashSet<(Uuid, i64)> {
        match list {
            RecipeList::Favorites => &mut self.favorites,
            RecipeList::ShoppingCart => &mut self.cart,
        }
    }

    fn check_refs(&self, tags: &[i64], lines: &[IngredientAmount]) -> Result<(), ApiError> {
        if let Some(id) = tags.iter().find(|id| !self.tags.iter().any(|t| t.id == **id)) {
            return Err(ApiError::NotFound(format!("tag {id} not found")));
        }
        if let Some(line) = lines
            .iter()
            .find(|l| !self.ingredients.iter().any(|i| i.id == l.ingredient_id))
        {
            return Err(ApiError::NotFound(format!(
                "ingredient {} not found",
                line.ingredient_id
            )));
        }
        Ok(())
    }

    fn aggregate(&self, stored: &StoredRecipe) -> RecipeAggregate {
        let tags = stored
            .tags
            .iter()
            .filter_map(|id| self.tags.iter().find(|t| t.id == *id).cloned())
            .collect();
        let mut ingredients: Vec<IngredientLine> = stored
            .ingredients
            .iter()
            .filter_map(|l| {
                self.ingredients
                    .iter()
                    .find(|i| i.id == l.ingredient_id)
                    .map(|i| IngredientLine {
                        recipe_id: stored.row.id,
                        ingredient_id: i.id,
                        name: i.name.clone(),
                        measurement_unit: i.measurement_unit.clone(),
                        amount: l.amount,
                    })
            })
            .collect();
        ingredients.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(a.ingredient_id.cmp(&b.ingredient_id))
        });
        RecipeAggregate {
            recipe: stored.row.clone(),
            tags,
            ingredients,
        }
    }

    fn matches(&self, stored: &StoredRecipe, filter: &RecipeFilter) -> bool {
        let id = stored.row.id;
        let tag_ok = filter.tags.is_empty()
            || stored.tags.iter().any(|tid| {
                self.tags
                    .iter()
                    .any(|t| t.id == *tid && filter.tags.contains(&t.slug.to_lowercase()))
            });
        tag_ok
            && filter.author.map_or(true, |a| stored.row.author_id == a)
            && filter
                .favorited_by
                .map_or(true, |u| self.favorites.contains(&(u, id)))
            && filter
                .in_cart_of
                .map_or(true, |u| self.cart.contains(&(u, id)))
    }

    /// Newest first; ids grow with insertion order.
    fn newest_first(&self) -> Vec<&StoredRecipe> {
        let mut out: Vec<&StoredRecipe> = self.recipes.iter().collect();
        out.sort_by(|a, b| b.row.id.cmp(&a.row.id));
        out
    }
}

/// Implements every repository trait plus the object store.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Data>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        },
        storage: StorageConfig {
            endpoint: "http://fake.local".into(),
            bucket: "fake".into(),
            access_key: "fake".into(),
            secret_key: "fake".into(),
            region: "us-east-1".into(),
            url_ttl_secs: 60,
        },
        page_size: 6,
    }
}

impl MemoryStore {
    pub fn state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let state = AppState::from_repo(
            Arc::new(test_config()),
            store.clone() as Arc<dyn StorageClient>,
            store.clone(),
        );
        (state, store)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Data> {
        self.data.lock().unwrap()
    }

    pub fn add_user(&self, username: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{username}@example.com"),
            username: username.into(),
            first_name: username.into(),
            last_name: "Cook".into(),
            password_hash: PASSWORD_HASH.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        let id = user.id;
        self.lock().users.push(user);
        id
    }

    pub fn add_tag(&self, slug: &str) -> i64 {
        let mut data = self.lock();
        let id = data.next_id();
        data.tags.push(Tag {
            id,
            name: slug.to_uppercase(),
            color: format!("#{:06X}", id),
            slug: slug.into(),
        });
        id
    }

    pub fn add_ingredient(&self, name: &str, unit: &str) -> i64 {
        let mut data = self.lock();
        let id = data.next_id();
        data.ingredients.push(Ingredient {
            id,
            name: name.into(),
            measurement_unit: unit.into(),
        });
        id
    }

    pub fn put_favorite(&self, user: Uuid, recipe: i64) {
        self.lock().favorites.insert((user, recipe));
    }

    pub fn put_in_cart(&self, user: Uuid, recipe: i64) {
        self.lock().cart.insert((user, recipe));
    }

    pub fn put_follow(&self, user: Uuid, author: Uuid) {
        self.lock().follows.insert((user, author));
    }

    pub fn recipe_count(&self) -> usize {
        self.lock().recipes.len()
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }
}

/// Inserts a tagless recipe straight through the repository.
pub async fn seed_recipe(
    state: &AppState,
    author: Uuid,
    name: &str,
    ingredients: &[(i64, i32)],
) -> i64 {
    let recipe = NewRecipe {
        name: name.into(),
        text: format!("How to make {name}"),
        cooking_time: 10,
        image: format!("recipes/{name}.png"),
        tags: Vec::new(),
        ingredients: ingredients
            .iter()
            .map(|&(ingredient_id, amount)| IngredientAmount {
                ingredient_id,
                amount,
            })
            .collect(),
    };
    state.recipes.create(author, &recipe).await.unwrap()
}

/// Migrated Postgres repository, or `None` when `DATABASE_URL` is unset.
/// Tests share the database, so fixtures carry unique names.
pub async fn pg_repo() -> Option<PgRepo> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set, skipping postgres test");
        return None;
    };
    let db = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&db).await.unwrap();
    Some(PgRepo::new(db))
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

pub async fn pg_user(repo: &PgRepo) -> Uuid {
    let username = unique("cook");
    let user = UserRepo::create(
        repo,
        &NewUser {
            email: format!("{username}@example.com"),
            username,
            first_name: "Test".into(),
            last_name: "Cook".into(),
            password_hash: PASSWORD_HASH.clone(),
        },
    )
    .await
    .unwrap();
    user.id
}

pub async fn pg_ingredient(repo: &PgRepo, name: &str, unit: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(unit)
    .fetch_one(&repo.db)
    .await
    .unwrap()
}

pub async fn pg_recipe(repo: &PgRepo, author: Uuid, tags: &[i64], lines: &[(i64, i32)]) -> i64 {
    let recipe = NewRecipe {
        name: unique("recipe"),
        text: "Cook it.".into(),
        cooking_time: 15,
        image: format!("recipes/{}.png", Uuid::new_v4()),
        tags: tags.to_vec(),
        ingredients: lines
            .iter()
            .map(|&(ingredient_id, amount)| IngredientAmount {
                ingredient_id,
                amount,
            })
            .collect(),
    };
    RecipeRepo::create(repo, author, &recipe).await.unwrap()
}

#[async_trait]
impl StorageClient for MemoryStore {
    async fn put_object(&self, key: &str, _body: Bytes, _ct: &str) -> anyhow::Result<()> {
        self.lock().objects.insert(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.lock().objects.remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
        Ok(format!("https://fake.local/{key}"))
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, ApiError> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn create(&self, user: &NewUser) -> Result<User, ApiError> {
        let mut data = self.lock();
        if data.users.iter().any(|u| u.username == user.username) {
            return Err(ApiError::validation("username", "username already taken"));
        }
        if data.users.iter().any(|u| u.email == user.email) {
            return Err(ApiError::validation("email", "email already registered"));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            password_hash: user.password_hash.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        data.users.push(created.clone());
        Ok(created)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(i64, Vec<User>), ApiError> {
        let data = self.lock();
        let mut users = data.users.clone();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        let count = users.len() as i64;
        let page = users
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((count, page))
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<(), ApiError> {
        let mut data = self.lock();
        let user = data
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| ApiError::not_found("user"))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn list_following(
        &self,
        user: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<User>), ApiError> {
        let data = self.lock();
        let mut authors: Vec<User> = data
            .users
            .iter()
            .filter(|u| data.follows.contains(&(user, u.id)))
            .cloned()
            .collect();
        authors.sort_by(|a, b| a.username.cmp(&b.username));
        let count = authors.len() as i64;
        let page = authors
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((count, page))
    }
}

#[async_trait]
impl CatalogRepo for MemoryStore {
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        Ok(self.lock().tags.clone())
    }

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>, ApiError> {
        Ok(self.lock().tags.iter().find(|t| t.id == id).cloned())
    }

    async fn search_ingredients(&self, name: Option<&str>) -> Result<Vec<Ingredient>, ApiError> {
        let needle = name.map(|n| n.trim().to_lowercase()).unwrap_or_default();
        let mut found: Vec<Ingredient> = self
            .lock()
            .ingredients
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn get_ingredient(&self, id: i64) -> Result<Option<Ingredient>, ApiError> {
        Ok(self.lock().ingredients.iter().find(|i| i.id == id).cloned())
    }
}

#[async_trait]
impl RecipeRepo for MemoryStore {
    async fn list(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<RecipeAggregate>), ApiError> {
        let data = self.lock();
        let matching: Vec<&StoredRecipe> = data
            .newest_first()
            .into_iter()
            .filter(|r| data.matches(r, filter))
            .collect();
        let count = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|r| data.aggregate(r))
            .collect();
        Ok((count, page))
    }

    async fn get(&self, id: i64) -> Result<Option<RecipeAggregate>, ApiError> {
        let data = self.lock();
        Ok(data
            .recipes
            .iter()
            .find(|r| r.row.id == id)
            .map(|r| data.aggregate(r)))
    }

    async fn get_row(&self, id: i64) -> Result<Option<RecipeRow>, ApiError> {
        Ok(self
            .lock()
            .recipes
            .iter()
            .find(|r| r.row.id == id)
            .map(|r| r.row.clone()))
    }

    async fn create(&self, author: Uuid, recipe: &NewRecipe) -> Result<i64, ApiError> {
        let mut data = self.lock();
        data.check_refs(&recipe.tags, &recipe.ingredients)?;
        let id = data.next_id();
        data.recipes.push(StoredRecipe {
            row: RecipeRow {
                id,
                author_id: author,
                name: recipe.name.clone(),
                image: recipe.image.clone(),
                text: recipe.text.clone(),
                cooking_time: recipe.cooking_time,
                created_at: OffsetDateTime::now_utc(),
            },
            tags: recipe.tags.clone(),
            ingredients: recipe.ingredients.clone(),
        });
        Ok(id)
    }

    async fn update(&self, id: i64, changes: &RecipeUpdate) -> Result<(), ApiError> {
        let mut data = self.lock();
        if !data.recipes.iter().any(|r| r.row.id == id) {
            return Err(ApiError::not_found("recipe"));
        }
        data.check_refs(&changes.tags, &changes.ingredients)?;
        let Some(stored) = data.recipes.iter_mut().find(|r| r.row.id == id) else {
            return Err(ApiError::not_found("recipe"));
        };
        if let Some(name) = &changes.name {
            stored.row.name = name.clone();
        }
        if let Some(text) = &changes.text {
            stored.row.text = text.clone();
        }
        if let Some(t) = changes.cooking_time {
            stored.row.cooking_time = t;
        }
        if let Some(image) = &changes.image {
            stored.row.image = image.clone();
        }
        stored.tags = changes.tags.clone();
        stored.ingredients = changes.ingredients.clone();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, ApiError> {
        let mut data = self.lock();
        let before = data.recipes.len();
        data.recipes.retain(|r| r.row.id != id);
        data.favorites.retain(|(_, r)| *r != id);
        data.cart.retain(|(_, r)| *r != id);
        Ok(data.recipes.len() < before)
    }

    async fn by_author(
        &self,
        author: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<RecipeRow>, ApiError> {
        let data = self.lock();
        let rows = data
            .newest_first()
            .into_iter()
            .filter(|r| r.row.author_id == author)
            .take(limit.map_or(usize::MAX, |l| l as usize))
            .map(|r| r.row.clone())
            .collect();
        Ok(rows)
    }

    async fn count_by_author(&self, author: Uuid) -> Result<i64, ApiError> {
        Ok(self
            .lock()
            .recipes
            .iter()
            .filter(|r| r.row.author_id == author)
            .count() as i64)
    }
}

#[async_trait]
impl RelationRepo for MemoryStore {
    async fn contains(&self, list: RecipeList, user: Uuid, recipe: i64) -> Result<bool, ApiError> {
        Ok(self.lock().list(list).contains(&(user, recipe)))
    }

    async fn insert(&self, list: RecipeList, user: Uuid, recipe: i64) -> Result<(), ApiError> {
        if !self.lock().list(list).insert((user, recipe)) {
            return Err(ApiError::Duplicate(list.duplicate_message().into()));
        }
        Ok(())
    }

    async fn remove(&self, list: RecipeList, user: Uuid, recipe: i64) -> Result<bool, ApiError> {
        Ok(self.lock().list(list).remove(&(user, recipe)))
    }

    async fn marked(
        &self,
        list: RecipeList,
        user: Uuid,
        recipes: &[i64],
    ) -> Result<HashSet<i64>, ApiError> {
        let mut data = self.lock();
        let set = data.list(list);
        Ok(recipes
            .iter()
            .copied()
            .filter(|r| set.contains(&(user, *r)))
            .collect())
    }

    async fn is_following(&self, user: Uuid, author: Uuid) -> Result<bool, ApiError> {
        Ok(self.lock().follows.contains(&(user, author)))
    }

    async fn follow(&self, user: Uuid, author: Uuid) -> Result<(), ApiError> {
        if !self.lock().follows.insert((user, author)) {
            return Err(ApiError::Duplicate(ALREADY_FOLLOWING.into()));
        }
        Ok(())
    }

    async fn unfollow(&self, user: Uuid, author: Uuid) -> Result<bool, ApiError> {
        Ok(self.lock().follows.remove(&(user, author)))
    }

    async fn followed_among(
        &self,
        user: Uuid,
        authors: &[Uuid],
    ) -> Result<HashSet<Uuid>, ApiError> {
        let data = self.lock();
        Ok(authors
            .iter()
            .copied()
            .filter(|a| data.follows.contains(&(user, *a)))
            .collect())
    }
}

#[async_trait]
impl ShoppingRepo for MemoryStore {
    async fn shopping_list(&self, user: Uuid) -> Result<Vec<ShoppingItem>, ApiError> {
        let data = self.lock();
        let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
        for stored in data
            .recipes
            .iter()
            .filter(|r| data.cart.contains(&(user, r.row.id)))
        {
            for line in data.aggregate(stored).ingredients {
                *totals
                    .entry((line.name, line.measurement_unit))
                    .or_default() += i64::from(line.amount);
            }
        }
        Ok(totals
            .into_iter()
            .map(|((name, measurement_unit), total_amount)| ShoppingItem {
                name,
                measurement_unit,
                total_amount,
            })
            .collect())
    }
}
