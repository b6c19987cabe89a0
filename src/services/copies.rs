//! Copy registry: inventory records for physical items

use std::sync::Arc;

use crate::{
    clock::Clock,
    directory::{CatalogDirectory, LocationDirectory},
    error::{AppError, AppResult},
    models::{
        copy::{
            ChangeCopyLocation, CopyDetails, CopyFilter, CreateCopy, NewCopy, UpdateCopyDetails,
        },
        CatalogRecord, CopyLocation, CopyState, InventoryCode, ItemCopy, LocationRecord,
        Placement,
    },
    store::{CirculationStore, CirculationTx},
};

/// State a copy takes when its loan ends.
///
/// Returns always reset the copy to Available, even when it was put into
/// Maintenance or marked Lost while on loan.
pub fn state_after_return(_prior: CopyState) -> CopyState {
    CopyState::Available
}

#[derive(Clone)]
pub struct CopyRegistry {
    store: Arc<dyn CirculationStore>,
    catalog: Arc<dyn CatalogDirectory>,
    locations: Arc<dyn LocationDirectory>,
    clock: Arc<dyn Clock>,
}

impl CopyRegistry {
    pub fn new(
        store: Arc<dyn CirculationStore>,
        catalog: Arc<dyn CatalogDirectory>,
        locations: Arc<dyn LocationDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog,
            locations,
            clock,
        }
    }

    /// Register a new copy in state Available
    pub async fn create(&self, request: CreateCopy) -> AppResult<ItemCopy> {
        let code = InventoryCode::parse(&request.inventory_code)?;
        let placement =
            Placement::from_parts(request.location, request.library_id, request.lab_id)?;

        self.ensure_catalog_item(request.catalog_item_id).await?;
        self.ensure_location(placement).await?;

        let mut tx = self.store.begin().await?;
        if tx.copy_by_code(&code).await?.is_some() {
            return Err(AppError::Conflict(format!("Inventory code {} already exists", code)));
        }

        let copy = tx
            .insert_copy(&NewCopy {
                catalog_item_id: request.catalog_item_id,
                inventory_code: code,
                placement,
                state: CopyState::Available,
                created_at: self.clock.now(),
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            "Copy {} ({}) registered for catalog item {}",
            copy.id,
            copy.inventory_code,
            copy.catalog_item_id
        );
        Ok(copy)
    }

    /// Change catalog linkage and/or inventory code
    pub async fn update_details(
        &self,
        copy_id: i32,
        request: UpdateCopyDetails,
    ) -> AppResult<ItemCopy> {
        let code = request
            .inventory_code
            .as_deref()
            .map(InventoryCode::parse)
            .transpose()?;

        if let Some(catalog_item_id) = request.catalog_item_id {
            self.ensure_catalog_item(catalog_item_id).await?;
        }

        let mut tx = self.store.begin().await?;
        let mut copy = Self::lock(tx.as_mut(), copy_id).await?;

        if let Some(code) = code {
            if let Some(existing) = tx.copy_by_code(&code).await? {
                if existing.id != copy_id {
                    return Err(AppError::Conflict(format!(
                        "Inventory code {} already exists",
                        code
                    )));
                }
            }
            copy.inventory_code = code.as_str().to_string();
        }
        if let Some(catalog_item_id) = request.catalog_item_id {
            copy.catalog_item_id = catalog_item_id;
        }
        copy.updated_at = self.clock.now();

        let copy = tx.save_copy(&copy).await?;
        tx.commit().await?;

        tracing::info!("Copy {} details updated", copy.id);
        Ok(copy)
    }

    /// Move a copy to another library or lab. Loan state is left alone.
    pub async fn change_location(
        &self,
        copy_id: i32,
        request: ChangeCopyLocation,
    ) -> AppResult<ItemCopy> {
        let placement = Placement::at(request.location, request.reference_id);
        self.ensure_location(placement).await?;

        let mut tx = self.store.begin().await?;
        let mut copy = Self::lock(tx.as_mut(), copy_id).await?;
        copy.place(placement);
        copy.updated_at = self.clock.now();

        let copy = tx.save_copy(&copy).await?;
        tx.commit().await?;

        tracing::info!(
            "Copy {} moved to {} {}",
            copy.id,
            copy.location.as_str(),
            request.reference_id
        );
        Ok(copy)
    }

    /// Administrative state change. Any transition is accepted, including
    /// overriding Loaned while a loan is open.
    pub async fn set_state(&self, copy_id: i32, state: CopyState) -> AppResult<ItemCopy> {
        let mut tx = self.store.begin().await?;
        let mut copy = Self::lock(tx.as_mut(), copy_id).await?;

        if copy.state != state {
            if let Some(loan) = tx.open_loan_for_copy(copy_id).await? {
                tracing::warn!(
                    "Copy {} changed from {} to {} while loan {} is open",
                    copy_id,
                    copy.state,
                    state,
                    loan.id
                );
            }
        }

        copy.state = state;
        copy.updated_at = self.clock.now();
        let copy = tx.save_copy(&copy).await?;
        tx.commit().await?;

        tracing::info!("Copy {} state set to {}", copy.id, copy.state);
        Ok(copy)
    }

    pub async fn mark_loaned(&self, copy_id: i32) -> AppResult<ItemCopy> {
        let mut tx = self.store.begin().await?;
        let copy = self.mark_loaned_in(tx.as_mut(), copy_id).await?;
        tx.commit().await?;
        Ok(copy)
    }

    /// Available -> Loaned inside an open transaction
    pub async fn mark_loaned_in(
        &self,
        tx: &mut dyn CirculationTx,
        copy_id: i32,
    ) -> AppResult<ItemCopy> {
        let mut copy = Self::lock(tx, copy_id).await?;
        if copy.state != CopyState::Available {
            return Err(AppError::Conflict(format!(
                "Copy {} cannot be loaned while {}",
                copy_id, copy.state
            )));
        }

        copy.state = CopyState::Loaned;
        copy.updated_at = self.clock.now();
        tx.save_copy(&copy).await
    }

    pub async fn mark_available(&self, copy_id: i32) -> AppResult<ItemCopy> {
        let mut tx = self.store.begin().await?;
        let copy = self.mark_available_in(tx.as_mut(), copy_id).await?;
        tx.commit().await?;
        Ok(copy)
    }

    /// Release a copy after its loan ended, whatever state it was in
    pub async fn mark_available_in(
        &self,
        tx: &mut dyn CirculationTx,
        copy_id: i32,
    ) -> AppResult<ItemCopy> {
        let mut copy = Self::lock(tx, copy_id).await?;
        let next = state_after_return(copy.state);
        if copy.state != CopyState::Loaned {
            tracing::debug!("Copy {} reset from {} to {}", copy_id, copy.state, next);
        }

        copy.state = next;
        copy.updated_at = self.clock.now();
        tx.save_copy(&copy).await
    }

    /// Remove a copy that has never been loaned
    pub async fn delete(&self, copy_id: i32) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        Self::lock(tx.as_mut(), copy_id).await?;

        let loans = tx.count_loans_for_copy(copy_id).await?;
        if loans > 0 {
            return Err(AppError::Conflict(format!(
                "Copy {} is referenced by {} loan record(s)",
                copy_id, loans
            )));
        }

        tx.delete_copy(copy_id).await?;
        tx.commit().await?;

        tracing::info!("Copy {} deleted", copy_id);
        Ok(())
    }

    pub async fn get(&self, copy_id: i32) -> AppResult<ItemCopy> {
        self.store
            .copy(copy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))
    }

    /// Look up by inventory code, case-insensitively
    pub async fn by_code(&self, raw: &str) -> AppResult<ItemCopy> {
        let code = InventoryCode::parse(raw)?;
        self.store
            .copy_by_code(&code)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Copy with inventory code {} not found", code))
            })
    }

    pub async fn code_exists(&self, raw: &str) -> AppResult<bool> {
        let code = InventoryCode::parse(raw)?;
        Ok(self.store.copy_by_code(&code).await?.is_some())
    }

    pub async fn list(&self, filter: &CopyFilter) -> AppResult<Vec<ItemCopy>> {
        tracing::debug!("Listing copies with filter {:?}", filter);
        self.store.copies(filter).await
    }

    pub async fn by_catalog_item(&self, catalog_item_id: i32) -> AppResult<Vec<ItemCopy>> {
        self.list(&CopyFilter {
            catalog_item_id: Some(catalog_item_id),
            ..Default::default()
        })
        .await
    }

    pub async fn by_location(&self, location: CopyLocation) -> AppResult<Vec<ItemCopy>> {
        self.list(&CopyFilter {
            location: Some(location),
            ..Default::default()
        })
        .await
    }

    pub async fn by_state(&self, state: CopyState) -> AppResult<Vec<ItemCopy>> {
        self.list(&CopyFilter {
            state: Some(state),
            ..Default::default()
        })
        .await
    }

    pub async fn by_library(&self, library_id: i32) -> AppResult<Vec<ItemCopy>> {
        self.list(&CopyFilter {
            library_id: Some(library_id),
            ..Default::default()
        })
        .await
    }

    pub async fn by_lab(&self, lab_id: i32) -> AppResult<Vec<ItemCopy>> {
        self.list(&CopyFilter {
            lab_id: Some(lab_id),
            ..Default::default()
        })
        .await
    }

    /// Copy joined with its catalog entry and its library or lab
    pub async fn details(&self, copy_id: i32) -> AppResult<CopyDetails> {
        let copy = self.get(copy_id).await?;
        self.describe(copy).await
    }

    /// Copies matching `filter` with their references. A copy whose catalog
    /// entry or location has disappeared is logged and left out.
    pub async fn list_with_details(&self, filter: &CopyFilter) -> AppResult<Vec<CopyDetails>> {
        let copies = self.list(filter).await?;
        let mut details = Vec::with_capacity(copies.len());

        for copy in copies {
            let copy_id = copy.id;
            match self.describe(copy).await {
                Ok(view) => details.push(view),
                Err(AppError::NotFound(reason)) => {
                    tracing::warn!("Copy {} left out of listing: {}", copy_id, reason)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(details)
    }

    async fn lock(tx: &mut dyn CirculationTx, copy_id: i32) -> AppResult<ItemCopy> {
        tx.copy_for_update(copy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))
    }

    async fn ensure_catalog_item(&self, catalog_item_id: i32) -> AppResult<()> {
        self.catalog_item(catalog_item_id).await.map(|_| ())
    }

    async fn ensure_location(&self, placement: Placement) -> AppResult<()> {
        self.location(placement).await.map(|_| ())
    }

    async fn catalog_item(&self, catalog_item_id: i32) -> AppResult<CatalogRecord> {
        self.catalog.get(catalog_item_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Catalog item with id {} not found", catalog_item_id))
        })
    }

    async fn location(&self, placement: Placement) -> AppResult<LocationRecord> {
        match placement {
            Placement::Library(id) => self
                .locations
                .library(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Library with id {} not found", id))),
            Placement::Lab(id) => self
                .locations
                .lab(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Lab with id {} not found", id))),
        }
    }

    async fn describe(&self, copy: ItemCopy) -> AppResult<CopyDetails> {
        let catalog = self.catalog_item(copy.catalog_item_id).await?;
        let location = self.location(copy.placement()?).await?;
        Ok(CopyDetails {
            copy,
            catalog,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::SystemClock,
        directory::{MockCatalogDirectory, MockLocationDirectory},
        models::{CatalogRecord, ItemKind, LocationRecord},
        store::MemoryStore,
    };

    fn registry(catalog: MockCatalogDirectory, locations: MockLocationDirectory) -> CopyRegistry {
        CopyRegistry::new(
            Arc::new(MemoryStore::new()),
            Arc::new(catalog),
            Arc::new(locations),
            Arc::new(SystemClock),
        )
    }

    fn book(id: i32) -> CatalogRecord {
        CatalogRecord {
            id,
            title: "Structure and Interpretation".to_string(),
            kind: ItemKind::Book,
            author: None,
            isbn: None,
        }
    }

    fn request(code: &str) -> CreateCopy {
        CreateCopy {
            catalog_item_id: 1,
            inventory_code: code.to_string(),
            location: CopyLocation::Library,
            library_id: Some(2),
            lab_id: None,
        }
    }

    #[test]
    fn test_return_always_resets_to_available() {
        for prior in [
            CopyState::Loaned,
            CopyState::Maintenance,
            CopyState::Lost,
            CopyState::Unavailable,
        ] {
            assert_eq!(state_after_return(prior), CopyState::Available);
        }
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_catalog_item() {
        let mut catalog = MockCatalogDirectory::new();
        catalog.expect_get().returning(|_| Ok(None));
        let mut locations = MockLocationDirectory::new();
        locations.expect_library().never();

        let err = registry(catalog, locations).create(request("LIB-001")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_library() {
        let mut catalog = MockCatalogDirectory::new();
        catalog.expect_get().returning(|id| Ok(Some(book(id))));
        let mut locations = MockLocationDirectory::new();
        locations.expect_library().returning(|_| Ok(None));

        let err = registry(catalog, locations).create(request("LIB-001")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_input_fails_before_any_lookup() {
        let mut catalog = MockCatalogDirectory::new();
        catalog.expect_get().never();
        let locations = MockLocationDirectory::new();
        let registry = registry(catalog, locations);

        let err = registry.create(request("ab")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut mismatched = request("LIB-001");
        mismatched.lab_id = Some(3);
        let err = registry.create(mismatched).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_mark_loaned_requires_available() {
        let mut catalog = MockCatalogDirectory::new();
        catalog.expect_get().returning(|id| Ok(Some(book(id))));
        let mut locations = MockLocationDirectory::new();
        locations.expect_library().returning(|id| {
            Ok(Some(LocationRecord {
                id,
                name: "Main".to_string(),
            }))
        });
        let registry = registry(catalog, locations);

        let copy = registry.create(request("lib-001")).await.unwrap();
        assert_eq!(copy.inventory_code, "LIB-001");
        assert_eq!(copy.state, CopyState::Available);

        registry.mark_loaned(copy.id).await.unwrap();
        let err = registry.mark_loaned(copy.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        registry.set_state(copy.id, CopyState::Maintenance).await.unwrap();
        let copy = registry.mark_available(copy.id).await.unwrap();
        assert_eq!(copy.state, CopyState::Available);
    }
}
