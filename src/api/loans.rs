//! Loan circulation endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::loan::{
        DueSoonQuery, IssueLoan, Loan, LoanDetails, LoanFilter, LoanQuery, RenewLoan, ReturnLoan,
        SweepReport,
    },
    AppState,
};

/// List loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans matching the filters", body = Vec<Loan>)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list(&LoanFilter::from(query)).await?;
    Ok(Json(loans))
}

/// Issue a copy to a borrower
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = IssueLoan,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Copy not available or invalid date"),
        (status = 404, description = "Borrower or copy not found")
    )
)]
pub async fn issue_loan(
    State(state): State<AppState>,
    Json(request): Json<IssueLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state.services.circulation.issue(request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Active loans with borrower and copy details
#[utoipa::path(
    get,
    path = "/loans/active",
    tag = "loans",
    responses(
        (status = 200, description = "Active loans", body = Vec<LoanDetails>)
    )
)]
pub async fn active_loans(State(state): State<AppState>) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.circulation.active_loans_with_details().await?;
    Ok(Json(loans))
}

/// Every loan with borrower and copy details
#[utoipa::path(
    get,
    path = "/loans/details",
    tag = "loans",
    responses(
        (status = 200, description = "All loans, oldest first", body = Vec<LoanDetails>)
    )
)]
pub async fn all_loan_details(State(state): State<AppState>) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.circulation.all_loans_with_details().await?;
    Ok(Json(loans))
}

/// Loans flagged overdue
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Overdue loans", body = Vec<Loan>)
    )
)]
pub async fn overdue_loans(State(state): State<AppState>) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.overdue().await?;
    Ok(Json(loans))
}

/// Active loans due within a number of days
#[utoipa::path(
    get,
    path = "/loans/due-soon",
    tag = "loans",
    params(DueSoonQuery),
    responses(
        (status = 200, description = "Loans due soon", body = Vec<Loan>),
        (status = 400, description = "Invalid window")
    )
)]
pub async fn due_soon(
    State(state): State<AppState>,
    Query(query): Query<DueSoonQuery>,
) -> AppResult<Json<Vec<Loan>>> {
    query.validate()?;
    let days = query.days.unwrap_or(state.config.circulation.due_soon_days);
    let loans = state.services.loans.due_within(days).await?;
    Ok(Json(loans))
}

/// Run the overdue sweep now
#[utoipa::path(
    post,
    path = "/loans/sweep",
    tag = "loans",
    responses(
        (status = 200, description = "Sweep finished", body = SweepReport)
    )
)]
pub async fn sweep_overdue(State(state): State<AppState>) -> AppResult<Json<SweepReport>> {
    let report = state.services.circulation.sweep_overdue().await?;
    Ok(Json(report))
}

/// Get loan details
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan with borrower and copy", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.circulation.loan_details(id).await?;
    Ok(Json(loan))
}

/// Delete a loan record
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 204, description = "Loan deleted, copy released if it was out"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn discard_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.circulation.discard(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Return a loaned copy
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body(content = ReturnLoan, description = "Optional; the return time defaults to now"),
    responses(
        (status = 200, description = "Loan completed", body = Loan),
        (status = 400, description = "Malformed body, already returned or return time before loan"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    request: Result<Json<ReturnLoan>, JsonRejection>,
) -> AppResult<Json<Loan>> {
    // A bodiless POST returns now; a body that does not parse is refused
    let request = match request {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => ReturnLoan::default(),
        Err(rejection) => return Err(AppError::Validation(rejection.body_text())),
    };
    let loan = state.services.circulation.return_copy(id, request).await?;
    Ok(Json(loan))
}

/// Extend the expected return date
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = RenewLoan,
    responses(
        (status = 200, description = "Loan renewed", body = Loan),
        (status = 400, description = "Loan overdue, not active or date in the past"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn renew_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<RenewLoan>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.circulation.renew(id, request).await?;
    Ok(Json(loan))
}

/// Loans of a borrower
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Loans of the user, oldest first", body = Vec<LoanDetails>),
        (status = 404, description = "User not found")
    )
)]
pub async fn user_loans(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.circulation.borrower_loans(user_id).await?;
    Ok(Json(loans))
}
