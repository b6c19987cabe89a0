//! Repository layer for database operations

pub mod copies;
pub mod directory;
pub mod loans;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        copy::{CopyFilter, ItemCopy, NewCopy},
        loan::{Loan, LoanFilter, NewLoan},
        InventoryCode,
    },
    store::{CirculationStore, CirculationTx},
};

/// SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for foreign_key_violation
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// Partial unique index allowing one Active/Overdue loan per copy
pub(crate) const OPEN_LOAN_INDEX: &str = "idx_loans_open_copy";

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub copies: copies::CopiesRepository,
    pub loans: loans::LoansRepository,
    pub directory: directory::DirectoryRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            copies: copies::CopiesRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            directory: directory::DirectoryRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Whether `err` was raised by the named constraint or index
pub(crate) fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error()
        .and_then(|db| db.constraint())
        .map_or(false, |name| name == constraint)
}

/// Translate constraint violations into business conflicts, keep the rest as
/// infrastructure errors.
pub(crate) fn map_constraint_error(
    err: sqlx::Error,
    conflict: impl FnOnce() -> String,
) -> AppError {
    let is_conflict = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == UNIQUE_VIOLATION || code == FOREIGN_KEY_VIOLATION)
        .unwrap_or(false);

    if is_conflict {
        AppError::Conflict(conflict())
    } else {
        AppError::Database(err)
    }
}

/// Open database transaction
pub struct PgCirculationTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CirculationTx for PgCirculationTx {
    async fn copy_for_update(&mut self, copy_id: i32) -> AppResult<Option<ItemCopy>> {
        copies::CopiesRepository::lock(&mut self.tx, copy_id).await
    }

    async fn copy_by_code(&mut self, code: &InventoryCode) -> AppResult<Option<ItemCopy>> {
        copies::CopiesRepository::find_by_code_in(&mut self.tx, code).await
    }

    async fn insert_copy(&mut self, copy: &NewCopy) -> AppResult<ItemCopy> {
        copies::CopiesRepository::insert(&mut self.tx, copy).await
    }

    async fn save_copy(&mut self, copy: &ItemCopy) -> AppResult<ItemCopy> {
        copies::CopiesRepository::save(&mut self.tx, copy).await
    }

    async fn delete_copy(&mut self, copy_id: i32) -> AppResult<()> {
        copies::CopiesRepository::delete(&mut self.tx, copy_id).await
    }

    async fn loan_for_update(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        loans::LoansRepository::lock(&mut self.tx, loan_id).await
    }

    async fn open_loan_for_copy(&mut self, copy_id: i32) -> AppResult<Option<Loan>> {
        loans::LoansRepository::open_for_copy(&mut self.tx, copy_id).await
    }

    async fn count_loans_for_copy(&mut self, copy_id: i32) -> AppResult<i64> {
        loans::LoansRepository::count_for_copy(&mut self.tx, copy_id).await
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        loans::LoansRepository::insert(&mut self.tx, loan).await
    }

    async fn save_loan(&mut self, loan: &Loan) -> AppResult<Loan> {
        loans::LoansRepository::save(&mut self.tx, loan).await
    }

    async fn delete_loan(&mut self, loan_id: i32) -> AppResult<()> {
        loans::LoansRepository::delete(&mut self.tx, loan_id).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl CirculationStore for Repository {
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCirculationTx { tx }))
    }

    async fn copy(&self, copy_id: i32) -> AppResult<Option<ItemCopy>> {
        self.copies.get_by_id(copy_id).await
    }

    async fn copy_by_code(&self, code: &InventoryCode) -> AppResult<Option<ItemCopy>> {
        self.copies.get_by_code(code).await
    }

    async fn copies(&self, filter: &CopyFilter) -> AppResult<Vec<ItemCopy>> {
        self.copies.list(filter).await
    }

    async fn loan(&self, loan_id: i32) -> AppResult<Option<Loan>> {
        self.loans.get_by_id(loan_id).await
    }

    async fn loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        self.loans.list(filter).await
    }
}
