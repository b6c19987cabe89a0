//! Loans repository for database operations

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use super::{map_constraint_error, violates, OPEN_LOAN_INDEX};
use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanFilter, LoanState, NewLoan},
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(loan)
    }

    /// List loans matching every filter that is set
    pub async fn list(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM loans WHERE TRUE");

        if let Some(id) = filter.borrower_id {
            builder.push(" AND borrower_id = ").push_bind(id);
        }
        if let Some(id) = filter.copy_id {
            builder.push(" AND copy_id = ").push_bind(id);
        }
        if let Some(state) = filter.state {
            builder.push(" AND state = ").push_bind(state);
        }
        if let Some(limit) = filter.due_on_or_before {
            builder.push(" AND expected_return_date <= ").push_bind(limit);
        }
        builder.push(" ORDER BY id");

        let loans = builder.build_query_as::<Loan>().fetch_all(&self.pool).await?;
        Ok(loans)
    }

    /// Load a loan and hold its row lock for the rest of the transaction
    pub(crate) async fn lock(conn: &mut PgConnection, id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(loan)
    }

    pub(crate) async fn open_for_copy(
        conn: &mut PgConnection,
        copy_id: i32,
    ) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE copy_id = $1 AND state IN ($2, $3)",
        )
        .bind(copy_id)
        .bind(LoanState::Active)
        .bind(LoanState::Overdue)
        .fetch_optional(conn)
        .await?;
        Ok(loan)
    }

    pub(crate) async fn count_for_copy(conn: &mut PgConnection, copy_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE copy_id = $1")
            .bind(copy_id)
            .fetch_one(conn)
            .await?;
        Ok(count)
    }

    /// Insert an Active loan. The partial unique index rejects a second open
    /// loan on the same copy; a vanished borrower or copy is a conflict.
    pub(crate) async fn insert(conn: &mut PgConnection, loan: &NewLoan) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (borrower_id, copy_id, loaned_at, expected_return_date, state)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(loan.borrower_id)
        .bind(loan.copy_id)
        .bind(loan.loaned_at)
        .bind(loan.expected_return_date)
        .bind(LoanState::Active)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            if violates(&e, OPEN_LOAN_INDEX) {
                return AppError::Validation(format!("Copy {} is already loaned", loan.copy_id));
            }
            map_constraint_error(e, || {
                format!(
                    "Loan of copy {} to user {} references a missing record",
                    loan.copy_id, loan.borrower_id
                )
            })
        })
    }

    pub(crate) async fn save(conn: &mut PgConnection, loan: &Loan) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET
                expected_return_date = $1,
                actual_return_date = $2,
                state = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(loan.expected_return_date)
        .bind(loan.actual_return_date)
        .bind(loan.state)
        .bind(loan.id)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            map_constraint_error(e, || format!("Copy {} already has an open loan", loan.copy_id))
        })?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan.id)))
    }

    pub(crate) async fn delete(conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }
        Ok(())
    }
}
