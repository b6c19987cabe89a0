//! Persistence ports for copies and loans.
//!
//! Every multi-record change runs inside a [`CirculationTx`]. Rows read with
//! the `*_for_update` methods stay locked until the transaction commits or is
//! dropped; dropping without [`CirculationTx::commit`] discards all writes.

pub mod memory;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{
        copy::{CopyFilter, ItemCopy, NewCopy},
        loan::{Loan, LoanFilter, NewLoan},
        InventoryCode,
    },
};

pub use memory::MemoryStore;

/// Unit of work over copies and loans
#[async_trait]
pub trait CirculationTx: Send {
    /// Load and lock a copy
    async fn copy_for_update(&mut self, copy_id: i32) -> AppResult<Option<ItemCopy>>;

    async fn copy_by_code(&mut self, code: &InventoryCode) -> AppResult<Option<ItemCopy>>;

    /// Fails with `Conflict` when the inventory code is taken
    async fn insert_copy(&mut self, copy: &NewCopy) -> AppResult<ItemCopy>;

    /// Fails with `Conflict` when the inventory code is taken
    async fn save_copy(&mut self, copy: &ItemCopy) -> AppResult<ItemCopy>;

    async fn delete_copy(&mut self, copy_id: i32) -> AppResult<()>;

    /// Load and lock a loan
    async fn loan_for_update(&mut self, loan_id: i32) -> AppResult<Option<Loan>>;

    /// The Active or Overdue loan holding this copy, if any
    async fn open_loan_for_copy(&mut self, copy_id: i32) -> AppResult<Option<Loan>>;

    /// Number of loan records of any state referencing the copy
    async fn count_loans_for_copy(&mut self, copy_id: i32) -> AppResult<i64>;

    /// Fails with `Validation` when the copy already has an open loan. Any
    /// other constraint failure is a `Conflict`.
    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;

    async fn save_loan(&mut self, loan: &Loan) -> AppResult<Loan>;

    async fn delete_loan(&mut self, loan_id: i32) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Storage for copies and loans
#[async_trait]
pub trait CirculationStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>>;

    async fn copy(&self, copy_id: i32) -> AppResult<Option<ItemCopy>>;

    async fn copy_by_code(&self, code: &InventoryCode) -> AppResult<Option<ItemCopy>>;

    async fn copies(&self, filter: &CopyFilter) -> AppResult<Vec<ItemCopy>>;

    async fn loan(&self, loan_id: i32) -> AppResult<Option<Loan>>;

    /// Ordered by loan id
    async fn loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>>;
}
