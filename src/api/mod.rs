//! HTTP handlers and router for the circulation API

pub mod copies;
pub mod health;
pub mod loans;
pub mod openapi;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Copies
        .route("/copies", get(copies::list_copies).post(copies::create_copy))
        .route("/copies/available", get(copies::list_available))
        .route("/copies/details", get(copies::list_copy_details))
        .route("/copies/by-code/:code", get(copies::get_copy_by_code))
        .route(
            "/copies/:id",
            get(copies::get_copy)
                .put(copies::update_copy)
                .delete(copies::delete_copy),
        )
        .route("/copies/:id/location", put(copies::change_location))
        .route("/copies/:id/state", put(copies::change_state))
        .route("/copies/:id/details", get(copies::get_copy_details))
        .route("/copies/:id/loans", get(copies::copy_loans))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::issue_loan))
        .route("/loans/active", get(loans::active_loans))
        .route("/loans/details", get(loans::all_loan_details))
        .route("/loans/overdue", get(loans::overdue_loans))
        .route("/loans/due-soon", get(loans::due_soon))
        .route("/loans/sweep", post(loans::sweep_overdue))
        .route("/loans/:id", get(loans::get_loan).delete(loans::discard_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        .route("/loans/:id/renew", post(loans::renew_loan))
        // Borrowers
        .route("/users/:id/loans", get(loans::user_loans))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
