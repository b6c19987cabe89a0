//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{copies, health, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "1.0.0",
        description = "Copy inventory and loan circulation for the university library and labs",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Copies
        copies::list_copies,
        copies::create_copy,
        copies::list_available,
        copies::list_copy_details,
        copies::get_copy_by_code,
        copies::get_copy,
        copies::get_copy_details,
        copies::update_copy,
        copies::delete_copy,
        copies::change_location,
        copies::change_state,
        copies::copy_loans,
        // Loans
        loans::list_loans,
        loans::issue_loan,
        loans::active_loans,
        loans::all_loan_details,
        loans::overdue_loans,
        loans::due_soon,
        loans::sweep_overdue,
        loans::get_loan,
        loans::discard_loan,
        loans::return_loan,
        loans::renew_loan,
        loans::user_loans,
    ),
    components(
        schemas(
            // Copies
            crate::models::copy::ItemCopy,
            crate::models::copy::CopyLocation,
            crate::models::copy::CopyState,
            crate::models::copy::CreateCopy,
            crate::models::copy::UpdateCopyDetails,
            crate::models::copy::ChangeCopyLocation,
            crate::models::copy::ChangeCopyState,
            crate::models::copy::AvailableCopy,
            crate::models::copy::CopyDetails,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanState,
            crate::models::loan::LoanDetails,
            crate::models::loan::IssueLoan,
            crate::models::loan::ReturnLoan,
            crate::models::loan::RenewLoan,
            crate::models::loan::SweepReport,
            // Reference records
            crate::models::reference::UserRecord,
            crate::models::reference::CatalogRecord,
            crate::models::reference::ItemKind,
            crate::models::reference::LocationRecord,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "copies", description = "Copy inventory"),
        (name = "loans", description = "Loan circulation")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_circulation_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/copies",
            "/copies/{id}/state",
            "/copies/{id}/details",
            "/loans/{id}/return",
            "/loans/details",
            "/loans/sweep",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
