//! Copy inventory endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        copy::{
            AvailableCopy, ChangeCopyLocation, ChangeCopyState, CopyDetails, CopyFilter,
            CreateCopy, UpdateCopyDetails,
        },
        ItemCopy, Loan,
    },
    AppState,
};

/// List copies
#[utoipa::path(
    get,
    path = "/copies",
    tag = "copies",
    params(CopyFilter),
    responses(
        (status = 200, description = "Copies matching the filters", body = Vec<ItemCopy>)
    )
)]
pub async fn list_copies(
    State(state): State<AppState>,
    Query(filter): Query<CopyFilter>,
) -> AppResult<Json<Vec<ItemCopy>>> {
    let copies = state.services.copies.list(&filter).await?;
    Ok(Json(copies))
}

/// Register a new copy
#[utoipa::path(
    post,
    path = "/copies",
    tag = "copies",
    request_body = CreateCopy,
    responses(
        (status = 201, description = "Copy created", body = ItemCopy),
        (status = 400, description = "Invalid code, location pairing or duplicate code"),
        (status = 404, description = "Catalog item, library or lab not found")
    )
)]
pub async fn create_copy(
    State(state): State<AppState>,
    Json(request): Json<CreateCopy>,
) -> AppResult<(StatusCode, Json<ItemCopy>)> {
    let copy = state.services.copies.create(request).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// Copies that can be loaned right now
#[utoipa::path(
    get,
    path = "/copies/available",
    tag = "copies",
    responses(
        (status = 200, description = "Available copies with catalog", body = Vec<AvailableCopy>)
    )
)]
pub async fn list_available(State(state): State<AppState>) -> AppResult<Json<Vec<AvailableCopy>>> {
    let copies = state.services.circulation.list_available_for_loan().await?;
    Ok(Json(copies))
}

/// List copies with catalog entry and location
#[utoipa::path(
    get,
    path = "/copies/details",
    tag = "copies",
    params(CopyFilter),
    responses(
        (status = 200, description = "Copies matching the filters", body = Vec<CopyDetails>)
    )
)]
pub async fn list_copy_details(
    State(state): State<AppState>,
    Query(filter): Query<CopyFilter>,
) -> AppResult<Json<Vec<CopyDetails>>> {
    let copies = state.services.copies.list_with_details(&filter).await?;
    Ok(Json(copies))
}

/// Get copy by inventory code
#[utoipa::path(
    get,
    path = "/copies/by-code/{code}",
    tag = "copies",
    params(
        ("code" = String, Path, description = "Inventory code, any case")
    ),
    responses(
        (status = 200, description = "Copy", body = ItemCopy),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn get_copy_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<ItemCopy>> {
    let copy = state.services.copies.by_code(&code).await?;
    Ok(Json(copy))
}

/// Get copy by ID
#[utoipa::path(
    get,
    path = "/copies/{id}",
    tag = "copies",
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Copy", body = ItemCopy),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn get_copy(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<ItemCopy>> {
    let copy = state.services.copies.get(id).await?;
    Ok(Json(copy))
}

/// Get copy with catalog entry and location
#[utoipa::path(
    get,
    path = "/copies/{id}/details",
    tag = "copies",
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Copy with references", body = CopyDetails),
        (status = 404, description = "Copy, catalog item or location not found")
    )
)]
pub async fn get_copy_details(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<CopyDetails>> {
    let copy = state.services.copies.details(id).await?;
    Ok(Json(copy))
}

/// Update catalog linkage or inventory code
#[utoipa::path(
    put,
    path = "/copies/{id}",
    tag = "copies",
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    request_body = UpdateCopyDetails,
    responses(
        (status = 200, description = "Copy updated", body = ItemCopy),
        (status = 400, description = "Invalid or duplicate code"),
        (status = 404, description = "Copy or catalog item not found")
    )
)]
pub async fn update_copy(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateCopyDetails>,
) -> AppResult<Json<ItemCopy>> {
    let copy = state.services.copies.update_details(id, request).await?;
    Ok(Json(copy))
}

/// Delete a copy with no loan history
#[utoipa::path(
    delete,
    path = "/copies/{id}",
    tag = "copies",
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    responses(
        (status = 204, description = "Copy deleted"),
        (status = 400, description = "Copy is referenced by loans"),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn delete_copy(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.copies.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move a copy to a library or lab
#[utoipa::path(
    put,
    path = "/copies/{id}/location",
    tag = "copies",
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    request_body = ChangeCopyLocation,
    responses(
        (status = 200, description = "Copy moved", body = ItemCopy),
        (status = 404, description = "Copy, library or lab not found")
    )
)]
pub async fn change_location(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<ChangeCopyLocation>,
) -> AppResult<Json<ItemCopy>> {
    let copy = state.services.copies.change_location(id, request).await?;
    Ok(Json(copy))
}

/// Set the availability state of a copy
#[utoipa::path(
    put,
    path = "/copies/{id}/state",
    tag = "copies",
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    request_body = ChangeCopyState,
    responses(
        (status = 200, description = "State changed", body = ItemCopy),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn change_state(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<ChangeCopyState>,
) -> AppResult<Json<ItemCopy>> {
    let copy = state.services.copies.set_state(id, request.state).await?;
    Ok(Json(copy))
}

/// Loan history of a copy
#[utoipa::path(
    get,
    path = "/copies/{id}/loans",
    tag = "copies",
    params(
        ("id" = i32, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Loans of the copy, oldest first", body = Vec<Loan>),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn copy_loans(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Loan>>> {
    state.services.copies.get(id).await?;
    let loans = state.services.loans.by_copy(id).await?;
    Ok(Json(loans))
}
