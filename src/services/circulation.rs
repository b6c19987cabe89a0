//! Circulation service: issue, return, renew and overdue sweeps.
//!
//! Every operation that touches both a copy and a loan runs in one store
//! transaction, with the copy row locked before the loan is written. Two
//! concurrent issues of the same copy therefore serialise on that lock and the
//! second one sees the copy as Loaned.

use std::collections::HashMap;
use std::sync::Arc;

use super::{copies::CopyRegistry, loans::LoanLedger, policy};
use crate::{
    clock::Clock,
    directory::{CatalogDirectory, UserDirectory},
    error::{AppError, AppResult},
    models::{
        copy::AvailableCopy,
        loan::{
            IssueLoan, Loan, LoanDetails, LoanFilter, LoanState, RenewLoan, ReturnLoan,
            SweepReport,
        },
        CopyState,
    },
    store::CirculationStore,
};

#[derive(Clone)]
pub struct CirculationService {
    store: Arc<dyn CirculationStore>,
    users: Arc<dyn UserDirectory>,
    catalog: Arc<dyn CatalogDirectory>,
    copies: CopyRegistry,
    loans: LoanLedger,
    clock: Arc<dyn Clock>,
}

impl CirculationService {
    pub fn new(
        store: Arc<dyn CirculationStore>,
        users: Arc<dyn UserDirectory>,
        catalog: Arc<dyn CatalogDirectory>,
        copies: CopyRegistry,
        loans: LoanLedger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            users,
            catalog,
            copies,
            loans,
            clock,
        }
    }

    /// Lend an available copy to a borrower
    pub async fn issue(&self, request: IssueLoan) -> AppResult<Loan> {
        if !self.users.exists(request.borrower_id).await? {
            return Err(AppError::NotFound(format!(
                "User with id {} not found",
                request.borrower_id
            )));
        }

        let mut tx = self.store.begin().await?;
        let copy = tx
            .copy_for_update(request.copy_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Copy with id {} not found", request.copy_id))
            })?;

        if copy.state != CopyState::Available {
            return Err(AppError::Validation(format!(
                "Copy {} is not available ({})",
                copy.id, copy.state
            )));
        }
        if tx.open_loan_for_copy(copy.id).await?.is_some() {
            return Err(AppError::Validation(format!("Copy {} is already loaned", copy.id)));
        }

        let loan = self
            .loans
            .create_in(tx.as_mut(), request.borrower_id, copy.id, request.expected_return_date)
            .await?;
        self.copies.mark_loaned_in(tx.as_mut(), copy.id).await?;
        tx.commit().await?;

        tracing::info!(
            "Loan {} issued: copy {} to user {} until {}",
            loan.id,
            loan.copy_id,
            loan.borrower_id,
            loan.expected_return_date
        );
        Ok(loan)
    }

    /// Complete a loan and release its copy
    pub async fn return_copy(&self, loan_id: i32, request: ReturnLoan) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;
        let loan = self
            .loans
            .record_return_in(tx.as_mut(), loan_id, request.actual_return_date)
            .await?;
        self.copies.mark_available_in(tx.as_mut(), loan.copy_id).await?;
        tx.commit().await?;

        tracing::info!("Loan {} returned, copy {} available", loan.id, loan.copy_id);
        Ok(loan)
    }

    pub async fn renew(&self, loan_id: i32, request: RenewLoan) -> AppResult<Loan> {
        self.loans.renew(loan_id, request.new_expected_return_date).await
    }

    /// Flag every past-due Active loan as Overdue.
    ///
    /// Each loan gets its own transaction and is re-checked under lock, so a
    /// return that lands mid-sweep wins and the loan stays Completed.
    pub async fn sweep_overdue(&self) -> AppResult<SweepReport> {
        let today = self.clock.today();
        let candidates = self.loans.active().await?;
        let mut report = SweepReport {
            examined: candidates.len(),
            flagged: Vec::new(),
        };

        for loan in candidates {
            if !policy::is_overdue(loan.expected_return_date, loan.actual_return_date, today) {
                continue;
            }

            let mut tx = self.store.begin().await?;
            if let Some(flagged) = self.loans.flag_overdue_in(tx.as_mut(), loan.id).await? {
                tx.commit().await?;
                tracing::debug!(
                    "Loan {} overdue by {} day(s)",
                    flagged.id,
                    policy::overdue_days(flagged.expected_return_date, None, today)
                );
                report.flagged.push(flagged.id);
            }
        }

        tracing::info!(
            "Overdue sweep examined {} active loan(s), flagged {}",
            report.examined,
            report.flagged.len()
        );
        Ok(report)
    }

    /// Available copies with their catalog entry
    pub async fn list_available_for_loan(&self) -> AppResult<Vec<AvailableCopy>> {
        let copies = self.copies.by_state(CopyState::Available).await?;
        let mut catalog = HashMap::new();
        let mut available = Vec::with_capacity(copies.len());

        for copy in copies {
            if !catalog.contains_key(&copy.catalog_item_id) {
                let record = self.catalog.get(copy.catalog_item_id).await?;
                catalog.insert(copy.catalog_item_id, record);
            }
            match catalog.get(&copy.catalog_item_id).cloned().flatten() {
                Some(record) => available.push(AvailableCopy {
                    copy,
                    catalog: record,
                }),
                None => tracing::warn!(
                    "Copy {} references missing catalog item {}",
                    copy.id,
                    copy.catalog_item_id
                ),
            }
        }

        Ok(available)
    }

    /// Delete a loan record. An open loan releases its copy first.
    pub async fn discard(&self, loan_id: i32) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let loan = tx
            .loan_for_update(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        if loan.state.is_open() {
            self.copies.mark_available_in(tx.as_mut(), loan.copy_id).await?;
        }
        tx.delete_loan(loan_id).await?;
        tx.commit().await?;

        tracing::info!("Loan {} discarded", loan_id);
        Ok(())
    }

    pub async fn loan_details(&self, loan_id: i32) -> AppResult<LoanDetails> {
        let loan = self.loans.get(loan_id).await?;
        self.details(loan).await
    }

    /// All loans of a borrower, oldest first
    pub async fn borrower_loans(&self, borrower_id: i32) -> AppResult<Vec<LoanDetails>> {
        if !self.users.exists(borrower_id).await? {
            return Err(AppError::NotFound(format!("User with id {} not found", borrower_id)));
        }
        let loans = self.loans.by_borrower(borrower_id).await?;
        self.details_for(loans).await
    }

    pub async fn active_loans_with_details(&self) -> AppResult<Vec<LoanDetails>> {
        let loans = self.loans.list(&LoanFilter::in_state(LoanState::Active)).await?;
        self.details_for(loans).await
    }

    /// Every loan record, any state
    pub async fn all_loans_with_details(&self) -> AppResult<Vec<LoanDetails>> {
        let loans = self.loans.list(&LoanFilter::default()).await?;
        self.details_for(loans).await
    }

    /// Loans whose borrower, copy or catalog entry no longer resolves are
    /// logged and left out.
    async fn details_for(&self, loans: Vec<Loan>) -> AppResult<Vec<LoanDetails>> {
        let mut details = Vec::with_capacity(loans.len());
        for loan in loans {
            let loan_id = loan.id;
            match self.details(loan).await {
                Ok(view) => details.push(view),
                Err(AppError::NotFound(reason)) => {
                    tracing::warn!("Loan {} left out of listing: {}", loan_id, reason)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(details)
    }

    async fn details(&self, loan: Loan) -> AppResult<LoanDetails> {
        let borrower = self.users.get(loan.borrower_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("User with id {} not found", loan.borrower_id))
        })?;
        let copy = self.copies.get(loan.copy_id).await?;
        let catalog = self.catalog.get(copy.catalog_item_id).await?.ok_or_else(|| {
            AppError::NotFound(format!(
                "Catalog item with id {} not found",
                copy.catalog_item_id
            ))
        })?;

        let today = self.clock.today();
        let is_overdue =
            policy::is_overdue(loan.expected_return_date, loan.actual_return_date, today);
        let overdue_days =
            policy::overdue_days(loan.expected_return_date, loan.actual_return_date, today);

        Ok(LoanDetails {
            loan,
            borrower,
            copy,
            catalog,
            is_overdue,
            overdue_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::SystemClock,
        directory::{MockCatalogDirectory, MockLocationDirectory, MockUserDirectory},
        models::{
            copy::{CopyFilter, CreateCopy, NewCopy},
            loan::NewLoan,
            CatalogRecord, CopyLocation, InventoryCode, ItemCopy, ItemKind, LocationRecord,
        },
        store::{CirculationTx, MemoryStore},
    };
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    /// Store whose loan inserts fail as if the borrower row vanished
    struct VanishingBorrowerStore(MemoryStore);

    struct VanishingBorrowerTx(Box<dyn CirculationTx>);

    #[async_trait]
    impl CirculationTx for VanishingBorrowerTx {
        async fn copy_for_update(&mut self, copy_id: i32) -> AppResult<Option<ItemCopy>> {
            self.0.copy_for_update(copy_id).await
        }

        async fn copy_by_code(&mut self, code: &InventoryCode) -> AppResult<Option<ItemCopy>> {
            self.0.copy_by_code(code).await
        }

        async fn insert_copy(&mut self, copy: &NewCopy) -> AppResult<ItemCopy> {
            self.0.insert_copy(copy).await
        }

        async fn save_copy(&mut self, copy: &ItemCopy) -> AppResult<ItemCopy> {
            self.0.save_copy(copy).await
        }

        async fn delete_copy(&mut self, copy_id: i32) -> AppResult<()> {
            self.0.delete_copy(copy_id).await
        }

        async fn loan_for_update(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
            self.0.loan_for_update(loan_id).await
        }

        async fn open_loan_for_copy(&mut self, copy_id: i32) -> AppResult<Option<Loan>> {
            self.0.open_loan_for_copy(copy_id).await
        }

        async fn count_loans_for_copy(&mut self, copy_id: i32) -> AppResult<i64> {
            self.0.count_loans_for_copy(copy_id).await
        }

        async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
            Err(AppError::Conflict(format!(
                "Loan references missing user {}",
                loan.borrower_id
            )))
        }

        async fn save_loan(&mut self, loan: &Loan) -> AppResult<Loan> {
            self.0.save_loan(loan).await
        }

        async fn delete_loan(&mut self, loan_id: i32) -> AppResult<()> {
            self.0.delete_loan(loan_id).await
        }

        async fn commit(self: Box<Self>) -> AppResult<()> {
            self.0.commit().await
        }
    }

    #[async_trait]
    impl CirculationStore for VanishingBorrowerStore {
        async fn begin(&self) -> AppResult<Box<dyn CirculationTx>> {
            Ok(Box::new(VanishingBorrowerTx(self.0.begin().await?)))
        }

        async fn copy(&self, copy_id: i32) -> AppResult<Option<ItemCopy>> {
            self.0.copy(copy_id).await
        }

        async fn copy_by_code(&self, code: &InventoryCode) -> AppResult<Option<ItemCopy>> {
            self.0.copy_by_code(code).await
        }

        async fn copies(&self, filter: &CopyFilter) -> AppResult<Vec<ItemCopy>> {
            self.0.copies(filter).await
        }

        async fn loan(&self, loan_id: i32) -> AppResult<Option<Loan>> {
            self.0.loan(loan_id).await
        }

        async fn loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
            self.0.loans(filter).await
        }
    }

    fn catalog() -> MockCatalogDirectory {
        let mut catalog = MockCatalogDirectory::new();
        catalog.expect_get().returning(|id| {
            Ok(Some(CatalogRecord {
                id,
                title: "Oscilloscope".to_string(),
                kind: ItemKind::Equipment,
                author: None,
                isbn: None,
            }))
        });
        catalog
    }

    fn locations() -> MockLocationDirectory {
        let mut locations = MockLocationDirectory::new();
        locations.expect_lab().returning(|id| {
            Ok(Some(LocationRecord {
                id,
                name: "Electronics".to_string(),
            }))
        });
        locations
    }

    fn service(users: MockUserDirectory, store: Arc<dyn CirculationStore>) -> CirculationService {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let catalog: Arc<dyn CatalogDirectory> = Arc::new(catalog());
        let copies = CopyRegistry::new(
            store.clone(),
            catalog.clone(),
            Arc::new(locations()),
            clock.clone(),
        );
        let loans = LoanLedger::new(store.clone(), clock.clone());
        CirculationService::new(store, Arc::new(users), catalog, copies, loans, clock)
    }

    async fn lab_copy(service: &CirculationService) -> i32 {
        service
            .copies
            .create(CreateCopy {
                catalog_item_id: 3,
                inventory_code: "LAB-SCOPE-1".to_string(),
                location: CopyLocation::Lab,
                library_id: None,
                lab_id: Some(1),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_issue_to_unknown_borrower_changes_nothing() {
        let mut users = MockUserDirectory::new();
        users.expect_exists().returning(|_| Ok(false));
        let store = Arc::new(MemoryStore::new());
        let service = service(users, store.clone());
        let copy_id = lab_copy(&service).await;

        let err = service
            .issue(IssueLoan {
                borrower_id: 99,
                copy_id,
                expected_return_date: Utc::now().date_naive() + Duration::days(7),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(service.copies.get(copy_id).await.unwrap().state, CopyState::Available);
        assert!(service.loans.by_copy(copy_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_issue_with_past_date_leaves_copy_available() {
        let mut users = MockUserDirectory::new();
        users.expect_exists().returning(|_| Ok(true));
        let service = service(users, Arc::new(MemoryStore::new()));
        let copy_id = lab_copy(&service).await;

        let err = service
            .issue(IssueLoan {
                borrower_id: 1,
                copy_id,
                expected_return_date: Utc::now().date_naive() - Duration::days(1),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(service.copies.get(copy_id).await.unwrap().state, CopyState::Available);
    }

    #[tokio::test]
    async fn test_issue_unknown_copy_is_not_found() {
        let mut users = MockUserDirectory::new();
        users.expect_exists().returning(|_| Ok(true));
        let service = service(users, Arc::new(MemoryStore::new()));

        let err = service
            .issue(IssueLoan {
                borrower_id: 1,
                copy_id: 404,
                expected_return_date: Utc::now().date_naive() + Duration::days(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_issue_keeps_storage_conflicts_distinct_from_already_loaned() {
        let mut users = MockUserDirectory::new();
        users.expect_exists().returning(|_| Ok(true));
        let service = service(users, Arc::new(VanishingBorrowerStore(MemoryStore::new())));
        let copy_id = lab_copy(&service).await;

        let err = service
            .issue(IssueLoan {
                borrower_id: 1,
                copy_id,
                expected_return_date: Utc::now().date_naive() + Duration::days(2),
            })
            .await
            .unwrap_err();

        match err {
            AppError::Conflict(message) => assert!(message.contains("missing user 1")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(service.copies.get(copy_id).await.unwrap().state, CopyState::Available);
    }

    #[tokio::test]
    async fn test_discard_open_loan_releases_copy() {
        let mut users = MockUserDirectory::new();
        users.expect_exists().returning(|_| Ok(true));
        let service = service(users, Arc::new(MemoryStore::new()));
        let copy_id = lab_copy(&service).await;

        let loan = service
            .issue(IssueLoan {
                borrower_id: 1,
                copy_id,
                expected_return_date: Utc::now().date_naive() + Duration::days(3),
            })
            .await
            .unwrap();
        assert_eq!(service.copies.get(copy_id).await.unwrap().state, CopyState::Loaned);

        service.discard(loan.id).await.unwrap();
        assert_eq!(service.copies.get(copy_id).await.unwrap().state, CopyState::Available);
        assert!(matches!(service.loans.get(loan.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.discard(loan.id).await, Err(AppError::NotFound(_))));
    }
}
