use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::PaginationParams;
use crate::middlewares::AuthUser;
use crate::models::{CollectionEntry, CreateCollectionEntry, UpdateCollectionEntry};
use crate::repositories::CollectionEntryRepository;
use crate::state::AppState;

// ============ Response DTOs ============

#[derive(Debug, Serialize, ToSchema)]
pub struct CollectionEntryListResponse {
    pub data: Vec<CollectionEntry>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

// ============ Handlers ============

/// Add a card to the current user's collection
#[utoipa::path(
    post,
    path = "/api/collection",
    request_body = CreateCollectionEntry,
    responses(
        (status = 200, description = "Entry created", body = CollectionEntry),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Card not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Collection"
)]
pub async fn create_entry(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCollectionEntry>,
) -> AppResult<Json<CollectionEntry>> {
    let entry = CollectionEntryRepository::create(&state.db, user.id, &payload).await?;
    Ok(Json(entry))
}

/// List the current user's collection, newest first
#[utoipa::path(
    get,
    path = "/api/collection",
    params(PaginationParams),
    responses(
        (status = 200, description = "Collection entries", body = CollectionEntryListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Collection"
)]
pub async fn list_entries(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<CollectionEntryListResponse>> {
    let (limit, offset) = params.resolve();

    let data = CollectionEntryRepository::list_by_user(&state.db, user.id, limit, offset).await?;
    let total = CollectionEntryRepository::count_by_user(&state.db, user.id).await?;

    Ok(Json(CollectionEntryListResponse {
        data,
        total,
        limit,
        offset,
    }))
}

/// Get one of the current user's entries
#[utoipa::path(
    get,
    path = "/api/collection/{id}",
    params(
        ("id" = Uuid, Path, description = "Collection entry ID")
    ),
    responses(
        (status = 200, description = "Entry details", body = CollectionEntry),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Entry not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Collection"
)]
pub async fn get_entry(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CollectionEntry>> {
    let entry = CollectionEntryRepository::find_by_id_and_user(&state.db, id, user.id).await?;
    Ok(Json(entry))
}

/// Update one of the current user's entries
#[utoipa::path(
    put,
    path = "/api/collection/{id}",
    params(
        ("id" = Uuid, Path, description = "Collection entry ID")
    ),
    request_body = UpdateCollectionEntry,
    responses(
        (status = 200, description = "Entry updated", body = CollectionEntry),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Entry not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Collection"
)]
pub async fn update_entry(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCollectionEntry>,
) -> AppResult<Json<CollectionEntry>> {
    let entry = CollectionEntryRepository::update(&state.db, id, user.id, &payload).await?;
    Ok(Json(entry))
}

/// Remove one of the current user's entries
#[utoipa::path(
    delete,
    path = "/api/collection/{id}",
    params(
        ("id" = Uuid, Path, description = "Collection entry ID")
    ),
    responses(
        (status = 200, description = "Entry deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Entry not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Collection"
)]
pub async fn delete_entry(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<()> {
    CollectionEntryRepository::delete_for_user(&state.db, id, user.id).await?;
    Ok(())
}
