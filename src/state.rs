use std::sync::Arc;

use crate::{
    catalog::repo::CatalogRepo,
    config::AppConfig,
    db::{self, PgRepo},
    recipes::repo::RecipeRepo,
    relations::repo::RelationRepo,
    shopping::repo::ShoppingRepo,
    storage::{S3ImageStore, StorageClient},
    users::repo::UserRepo,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
    pub users: Arc<dyn UserRepo>,
    pub catalog: Arc<dyn CatalogRepo>,
    pub recipes: Arc<dyn RecipeRepo>,
    pub relations: Arc<dyn RelationRepo>,
    pub shopping: Arc<dyn ShoppingRepo>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let pool = db::connect(&config).await?;

        // S3/MinIO
        let storage = Arc::new(S3ImageStore::connect(&config.storage).await?) as Arc<dyn StorageClient>;

        Ok(Self::from_repo(config, storage, Arc::new(PgRepo::new(pool))))
    }

    /// Wires one backend that implements every repository trait.
    pub fn from_repo<R>(config: Arc<AppConfig>, storage: Arc<dyn StorageClient>, repo: Arc<R>) -> Self
    where
        R: UserRepo + CatalogRepo + RecipeRepo + RelationRepo + ShoppingRepo + 'static,
    {
        Self {
            config,
            storage,
            users: repo.clone(),
            catalog: repo.clone(),
            recipes: repo.clone(),
            relations: repo.clone(),
            shopping: repo,
        }
    }
}
