//! In-memory circulation store.
//!
//! A single async mutex guards the whole state. A transaction holds the lock
//! from `begin` to commit/drop and mutates a private snapshot that replaces the
//! shared state only on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{CirculationStore, CirculationTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        copy::{CopyFilter, ItemCopy, NewCopy},
        loan::{Loan, LoanFilter, LoanState, NewLoan},
        InventoryCode,
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    copies: BTreeMap<i32, ItemCopy>,
    loans: BTreeMap<i32, Loan>,
    next_copy_id: i32,
    next_loan_id: i32,
}

impl MemoryState {
    fn code_taken(&self, code: &str, except: Option<i32>) -> bool {
        self.copies
            .values()
            .any(|c| c.inventory_code == code && Some(c.id) != except)
    }

    fn open_loan_for_copy(&self, copy_id: i32, except: Option<i32>) -> Option<&Loan> {
        self.loans
            .values()
            .find(|l| l.copy_id == copy_id && l.state.is_open() && Some(l.id) != except)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl CirculationTx for MemoryTx {
    async fn copy_for_update(&mut self, copy_id: i32) -> AppResult<Option<ItemCopy>> {
        Ok(self.working.copies.get(&copy_id).cloned())
    }

    async fn copy_by_code(&mut self, code: &InventoryCode) -> AppResult<Option<ItemCopy>> {
        Ok(self
            .working
            .copies
            .values()
            .find(|c| c.inventory_code == code.as_str())
            .cloned())
    }

    async fn insert_copy(&mut self, copy: &NewCopy) -> AppResult<ItemCopy> {
        if self.working.code_taken(copy.inventory_code.as_str(), None) {
            return Err(AppError::Conflict(format!(
                "Inventory code {} already exists",
                copy.inventory_code
            )));
        }

        self.working.next_copy_id += 1;
        let stored = ItemCopy {
            id: self.working.next_copy_id,
            catalog_item_id: copy.catalog_item_id,
            inventory_code: copy.inventory_code.as_str().to_string(),
            location: copy.placement.location(),
            library_id: copy.placement.library_id(),
            lab_id: copy.placement.lab_id(),
            state: copy.state,
            created_at: copy.created_at,
            updated_at: copy.created_at,
        };
        self.working.copies.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save_copy(&mut self, copy: &ItemCopy) -> AppResult<ItemCopy> {
        if !self.working.copies.contains_key(&copy.id) {
            return Err(AppError::NotFound(format!("Copy with id {} not found", copy.id)));
        }
        copy.placement()?;
        if self.working.code_taken(&copy.inventory_code, Some(copy.id)) {
            return Err(AppError::Conflict(format!(
                "Inventory code {} already exists",
                copy.inventory_code
            )));
        }
        self.working.copies.insert(copy.id, copy.clone());
        Ok(copy.clone())
    }

    async fn delete_copy(&mut self, copy_id: i32) -> AppResult<()> {
        if self.working.loans.values().any(|l| l.copy_id == copy_id) {
            return Err(AppError::Conflict(format!(
                "Copy {} is referenced by loan records",
                copy_id
            )));
        }
        self.working
            .copies
            .remove(&copy_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))
    }

    async fn loan_for_update(&mut self, loan_id: i32) -> AppResult<Option<Loan>> {
        Ok(self.working.loans.get(&loan_id).cloned())
    }

    async fn open_loan_for_copy(&mut self, copy_id: i32) -> AppResult<Option<Loan>> {
        Ok(self.working.open_loan_for_copy(copy_id, None).cloned())
    }

    async fn count_loans_for_copy(&mut self, copy_id: i32) -> AppResult<i64> {
        Ok(self
            .working
            .loans
            .values()
            .filter(|l| l.copy_id == copy_id)
            .count() as i64)
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        if !self.working.copies.contains_key(&loan.copy_id) {
            return Err(AppError::NotFound(format!("Copy with id {} not found", loan.copy_id)));
        }
        if self.working.open_loan_for_copy(loan.copy_id, None).is_some() {
            return Err(AppError::Validation(format!("Copy {} is already loaned", loan.copy_id)));
        }

        self.working.next_loan_id += 1;
        let stored = Loan {
            id: self.working.next_loan_id,
            borrower_id: loan.borrower_id,
            copy_id: loan.copy_id,
            loaned_at: loan.loaned_at,
            expected_return_date: loan.expected_return_date,
            actual_return_date: None,
            state: LoanState::Active,
        };
        self.working.loans.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save_loan(&mut self, loan: &Loan) -> AppResult<Loan> {
        if !self.working.loans.contains_key(&loan.id) {
            return Err(AppError::NotFound(format!("Loan with id {} not found", loan.id)));
        }
        if loan.state.is_open()
            && self
                .working
                .open_loan_for_copy(loan.copy_id, Some(loan.id))
                .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Copy {} already has an open loan",
                loan.copy_id
            )));
        }
        self.working.loans.insert(loan.id, loan.clone());
        Ok(loan.clone())
    }

    async fn delete_loan(&mut self, loan_id: i32) -> AppResult<()> {
        self.working
            .loans
            .remove(&loan_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl CirculationStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn CirculationTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn copy(&self, copy_id: i32) -> AppResult<Option<ItemCopy>> {
        Ok(self.state.lock().await.copies.get(&copy_id).cloned())
    }

    async fn copy_by_code(&self, code: &InventoryCode) -> AppResult<Option<ItemCopy>> {
        Ok(self
            .state
            .lock()
            .await
            .copies
            .values()
            .find(|c| c.inventory_code == code.as_str())
            .cloned())
    }

    async fn copies(&self, filter: &CopyFilter) -> AppResult<Vec<ItemCopy>> {
        Ok(self
            .state
            .lock()
            .await
            .copies
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn loan(&self, loan_id: i32) -> AppResult<Option<Loan>> {
        Ok(self.state.lock().await.loans.get(&loan_id).cloned())
    }

    async fn loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        Ok(self
            .state
            .lock()
            .await
            .loans
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect())
    }
}
