//! Loan model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::copy::ItemCopy;
use super::reference::{CatalogRecord, UserRecord};

/// Loan lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoanState {
    #[default]
    Active,
    Completed,
    Overdue,
}

impl LoanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Active => "active",
            LoanState::Completed => "completed",
            LoanState::Overdue => "overdue",
        }
    }

    /// Active and Overdue loans still hold their copy
    pub fn is_open(&self) -> bool {
        matches!(self, LoanState::Active | LoanState::Overdue)
    }
}

impl std::str::FromStr for LoanState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(LoanState::Active),
            "completed" => Ok(LoanState::Completed),
            "overdue" => Ok(LoanState::Overdue),
            _ => Err(format!("Invalid loan state: {}", s)),
        }
    }
}

text_column!(LoanState);

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub borrower_id: i32,
    pub copy_id: i32,
    pub loaned_at: DateTime<Utc>,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<DateTime<Utc>>,
    pub state: LoanState,
}

/// Loan validated by the ledger, not yet stored
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub borrower_id: i32,
    pub copy_id: i32,
    pub loaned_at: DateTime<Utc>,
    pub expected_return_date: NaiveDate,
}

/// Loan with borrower, copy and catalog entry for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    pub loan: Loan,
    pub borrower: UserRecord,
    pub copy: ItemCopy,
    pub catalog: CatalogRecord,
    pub is_overdue: bool,
    pub overdue_days: i64,
}

/// Issue loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IssueLoan {
    pub borrower_id: i32,
    pub copy_id: i32,
    /// Calendar date, must not be in the past
    pub expected_return_date: NaiveDate,
}

/// Return request; the return time defaults to now
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReturnLoan {
    pub actual_return_date: Option<DateTime<Utc>>,
}

/// Renew request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RenewLoan {
    pub new_expected_return_date: NaiveDate,
}

/// Loan list filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub borrower_id: Option<i32>,
    pub copy_id: Option<i32>,
    pub state: Option<LoanState>,
}

/// Due-soon window
#[derive(Debug, Clone, Default, Deserialize, Validate, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct DueSoonQuery {
    /// Days ahead of today; defaults to the configured window
    #[validate(range(min = 0, max = 365, message = "days must be between 0 and 365"))]
    pub days: Option<i64>,
}

/// Storage-level loan filter
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub borrower_id: Option<i32>,
    pub copy_id: Option<i32>,
    pub state: Option<LoanState>,
    /// Inclusive upper bound on the expected return date
    pub due_on_or_before: Option<NaiveDate>,
}

impl LoanFilter {
    pub fn in_state(state: LoanState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn matches(&self, loan: &Loan) -> bool {
        self.borrower_id.map_or(true, |id| loan.borrower_id == id)
            && self.copy_id.map_or(true, |id| loan.copy_id == id)
            && self.state.map_or(true, |s| loan.state == s)
            && self
                .due_on_or_before
                .map_or(true, |d| loan.expected_return_date <= d)
    }
}

impl From<LoanQuery> for LoanFilter {
    fn from(q: LoanQuery) -> Self {
        Self {
            borrower_id: q.borrower_id,
            copy_id: q.copy_id,
            state: q.state,
            due_on_or_before: None,
        }
    }
}

/// Outcome of one overdue sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Active loans looked at
    pub examined: usize,
    /// Loans moved from Active to Overdue by this run
    pub flagged: Vec<i32>,
}
