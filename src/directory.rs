//! Lookups into records owned by other modules (users, catalog, libraries, labs).
//!
//! Circulation only reads these; their CRUD lives elsewhere.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{CatalogRecord, LocationRecord, UserRecord},
};

/// Port for borrower lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: i32) -> AppResult<bool>;

    async fn get(&self, user_id: i32) -> AppResult<Option<UserRecord>>;
}

/// Port for catalog item lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogDirectory: Send + Sync {
    async fn get(&self, catalog_item_id: i32) -> AppResult<Option<CatalogRecord>>;
}

/// Port for library and lab registry lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationDirectory: Send + Sync {
    async fn library(&self, library_id: i32) -> AppResult<Option<LocationRecord>>;

    async fn lab(&self, lab_id: i32) -> AppResult<Option<LocationRecord>>;
}

/// The three collaborators injected into the services
#[derive(Clone)]
pub struct Directories {
    pub users: Arc<dyn UserDirectory>,
    pub catalog: Arc<dyn CatalogDirectory>,
    pub locations: Arc<dyn LocationDirectory>,
}

impl Directories {
    /// Use one value for all three ports
    pub fn from_shared<D>(directory: Arc<D>) -> Self
    where
        D: UserDirectory + CatalogDirectory + LocationDirectory + 'static,
    {
        Self {
            users: directory.clone(),
            catalog: directory.clone(),
            locations: directory,
        }
    }
}

#[derive(Debug, Default)]
struct FixtureRecords {
    users: HashMap<i32, UserRecord>,
    catalog: HashMap<i32, CatalogRecord>,
    libraries: HashMap<i32, LocationRecord>,
    labs: HashMap<i32, LocationRecord>,
}

/// In-memory directory for tests and local runs without the admin modules
#[derive(Debug, Default)]
pub struct FixtureDirectory {
    records: RwLock<FixtureRecords>,
}

impl FixtureDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: UserRecord) -> &Self {
        self.write().users.insert(user.id, user);
        self
    }

    pub fn add_catalog_item(&self, item: CatalogRecord) -> &Self {
        self.write().catalog.insert(item.id, item);
        self
    }

    pub fn add_library(&self, library: LocationRecord) -> &Self {
        self.write().libraries.insert(library.id, library);
        self
    }

    pub fn add_lab(&self, lab: LocationRecord) -> &Self {
        self.write().labs.insert(lab.id, lab);
        self
    }

    pub fn remove_user(&self, user_id: i32) {
        self.write().users.remove(&user_id);
    }

    pub fn remove_lab(&self, lab_id: i32) {
        self.write().labs.remove(&lab_id);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, FixtureRecords> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, FixtureRecords> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserDirectory for FixtureDirectory {
    async fn exists(&self, user_id: i32) -> AppResult<bool> {
        Ok(self.read().users.contains_key(&user_id))
    }

    async fn get(&self, user_id: i32) -> AppResult<Option<UserRecord>> {
        Ok(self.read().users.get(&user_id).cloned())
    }
}

#[async_trait]
impl CatalogDirectory for FixtureDirectory {
    async fn get(&self, catalog_item_id: i32) -> AppResult<Option<CatalogRecord>> {
        Ok(self.read().catalog.get(&catalog_item_id).cloned())
    }
}

#[async_trait]
impl LocationDirectory for FixtureDirectory {
    async fn library(&self, library_id: i32) -> AppResult<Option<LocationRecord>> {
        Ok(self.read().libraries.get(&library_id).cloned())
    }

    async fn lab(&self, lab_id: i32) -> AppResult<Option<LocationRecord>> {
        Ok(self.read().labs.get(&lab_id).cloned())
    }
}
