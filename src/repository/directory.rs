//! Read-only lookups into the users, catalog, library and lab tables

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    directory::{CatalogDirectory, LocationDirectory, UserDirectory},
    error::AppResult,
    models::{CatalogRecord, LocationRecord, UserRecord},
};

#[derive(Clone)]
pub struct DirectoryRepository {
    pool: Pool<Postgres>,
}

impl DirectoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for DirectoryRepository {
    async fn exists(&self, user_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn get(&self, user_id: i32) -> AppResult<Option<UserRecord>> {
        let user =
            sqlx::query_as::<_, UserRecord>("SELECT id, name, email FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }
}

#[async_trait]
impl CatalogDirectory for DirectoryRepository {
    async fn get(&self, catalog_item_id: i32) -> AppResult<Option<CatalogRecord>> {
        let item = sqlx::query_as::<_, CatalogRecord>(
            "SELECT id, title, kind, author, isbn FROM catalog_items WHERE id = $1",
        )
        .bind(catalog_item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }
}

#[async_trait]
impl LocationDirectory for DirectoryRepository {
    async fn library(&self, library_id: i32) -> AppResult<Option<LocationRecord>> {
        let library =
            sqlx::query_as::<_, LocationRecord>("SELECT id, name FROM libraries WHERE id = $1")
                .bind(library_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(library)
    }

    async fn lab(&self, lab_id: i32) -> AppResult<Option<LocationRecord>> {
        let lab = sqlx::query_as::<_, LocationRecord>("SELECT id, name FROM labs WHERE id = $1")
            .bind(lab_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lab)
    }
}
