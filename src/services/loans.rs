//! Loan ledger service
//!
//! Stores loan records and applies the date rules to them. Cross-entity checks
//! (borrower exists, copy available) belong to the circulation service, which
//! is the only caller that creates or returns loans.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use super::policy;
use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::loan::{Loan, LoanFilter, LoanState, NewLoan},
    store::{CirculationStore, CirculationTx},
};

#[derive(Clone)]
pub struct LoanLedger {
    store: Arc<dyn CirculationStore>,
    clock: Arc<dyn Clock>,
}

impl LoanLedger {
    pub fn new(store: Arc<dyn CirculationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Stamp and validate a loan about to be created
    pub fn draft(
        &self,
        borrower_id: i32,
        copy_id: i32,
        expected_return_date: NaiveDate,
    ) -> AppResult<NewLoan> {
        policy::validate_expected_return(expected_return_date, self.clock.today())?;
        Ok(NewLoan {
            borrower_id,
            copy_id,
            loaned_at: self.clock.now(),
            expected_return_date,
        })
    }

    /// Store a new Active loan
    pub async fn create_in(
        &self,
        tx: &mut dyn CirculationTx,
        borrower_id: i32,
        copy_id: i32,
        expected_return_date: NaiveDate,
    ) -> AppResult<Loan> {
        let draft = self.draft(borrower_id, copy_id, expected_return_date)?;
        tx.insert_loan(&draft).await
    }

    /// Complete a loan inside an open transaction
    pub async fn record_return_in(
        &self,
        tx: &mut dyn CirculationTx,
        loan_id: i32,
        returned_at: Option<DateTime<Utc>>,
    ) -> AppResult<Loan> {
        let mut loan = Self::lock(tx, loan_id).await?;
        if loan.state == LoanState::Completed {
            return Err(AppError::Conflict(format!("Loan {} was already returned", loan_id)));
        }

        let returned_at = returned_at.unwrap_or_else(|| self.clock.now());
        policy::validate_return_time(loan.loaned_at, returned_at)?;

        loan.actual_return_date = Some(returned_at);
        loan.state = LoanState::Completed;
        tx.save_loan(&loan).await
    }

    /// Extend an Active loan that is not yet past due
    pub async fn renew(
        &self,
        loan_id: i32,
        new_expected_return_date: NaiveDate,
    ) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;
        let loan = self.renew_in(tx.as_mut(), loan_id, new_expected_return_date).await?;
        tx.commit().await?;

        tracing::info!(
            "Loan {} renewed until {}",
            loan.id,
            loan.expected_return_date
        );
        Ok(loan)
    }

    pub async fn renew_in(
        &self,
        tx: &mut dyn CirculationTx,
        loan_id: i32,
        new_expected_return_date: NaiveDate,
    ) -> AppResult<Loan> {
        let mut loan = Self::lock(tx, loan_id).await?;
        let today = self.clock.today();

        if loan.state != LoanState::Active {
            return Err(AppError::Conflict(format!(
                "Loan {} is {} and cannot be renewed",
                loan_id, loan.state
            )));
        }
        if !policy::can_renew(
            loan.expected_return_date,
            loan.actual_return_date,
            loan.state,
            today,
        ) {
            return Err(AppError::Validation(format!(
                "Loan {} is overdue and cannot be renewed",
                loan_id
            )));
        }
        policy::validate_expected_return(new_expected_return_date, today)?;

        loan.expected_return_date = new_expected_return_date;
        tx.save_loan(&loan).await
    }

    /// Move one loan to Overdue if it is still Active and past due.
    ///
    /// Re-reads the loan under lock, so a return committed since the caller
    /// listed it is never overwritten. Returns `None` when nothing changed.
    pub async fn flag_overdue_in(
        &self,
        tx: &mut dyn CirculationTx,
        loan_id: i32,
    ) -> AppResult<Option<Loan>> {
        let Some(mut loan) = tx.loan_for_update(loan_id).await? else {
            return Ok(None);
        };
        let today = self.clock.today();
        if loan.state != LoanState::Active
            || !policy::is_overdue(loan.expected_return_date, loan.actual_return_date, today)
        {
            return Ok(None);
        }

        loan.state = LoanState::Overdue;
        tx.save_loan(&loan).await.map(Some)
    }

    pub async fn get(&self, loan_id: i32) -> AppResult<Loan> {
        self.store
            .loan(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    pub async fn list(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        tracing::debug!("Listing loans with filter {:?}", filter);
        self.store.loans(filter).await
    }

    pub async fn by_borrower(&self, borrower_id: i32) -> AppResult<Vec<Loan>> {
        self.list(&LoanFilter {
            borrower_id: Some(borrower_id),
            ..Default::default()
        })
        .await
    }

    pub async fn by_copy(&self, copy_id: i32) -> AppResult<Vec<Loan>> {
        self.list(&LoanFilter {
            copy_id: Some(copy_id),
            ..Default::default()
        })
        .await
    }

    pub async fn by_state(&self, state: LoanState) -> AppResult<Vec<Loan>> {
        self.list(&LoanFilter::in_state(state)).await
    }

    pub async fn active(&self) -> AppResult<Vec<Loan>> {
        self.by_state(LoanState::Active).await
    }

    pub async fn overdue(&self) -> AppResult<Vec<Loan>> {
        self.by_state(LoanState::Overdue).await
    }

    /// Active loans expected back on or before today + `days`
    pub async fn due_within(&self, days: i64) -> AppResult<Vec<Loan>> {
        let until = policy::due_window_end(self.clock.today(), days)?;
        self.list(&LoanFilter {
            state: Some(LoanState::Active),
            due_on_or_before: Some(until),
            ..Default::default()
        })
        .await
    }

    async fn lock(tx: &mut dyn CirculationTx, loan_id: i32) -> AppResult<Loan> {
        tx.loan_for_update(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }
}
