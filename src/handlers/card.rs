use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middlewares::AuthUser;
use crate::models::{Card, CardPrice, CardSummary};
use crate::repositories::{CardPriceRepository, CardRepository};
use crate::services::card_search::{
    parse_colors, parse_positive, parse_rarity, CardSearchCriteria, DEFAULT_PAGE_SIZE,
};
use crate::services::{CardImportService, ImportSummary, ScryfallCard};
use crate::state::AppState;

// ============ Request/Response DTOs ============

/// Raw search parameters. Everything arrives as text and is validated in
/// [`CardSearchParams::into_criteria`].
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CardSearchParams {
    /// 1-based page number
    #[param(default = 1, minimum = 1)]
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    #[param(default = 10, minimum = 1, maximum = 100)]
    pub page_size: Option<String>,
    /// Exact oracle text, or a substring of the card name
    #[serde(rename = "searchText")]
    pub search_text: Option<String>,
    #[serde(alias = "setCode")]
    pub set_code: Option<String>,
    #[serde(alias = "typeLine")]
    pub type_line: Option<String>,
    pub rarity: Option<String>,
    /// Comma-separated color letters (W, U, B, R, G); matches cards with any of them
    pub colors: Option<String>,
}

impl CardSearchParams {
    pub fn into_criteria(self) -> AppResult<CardSearchCriteria> {
        let page = parse_positive(self.page.as_deref(), "page", 1)?;
        let page_size = parse_positive(self.page_size.as_deref(), "pageSize", DEFAULT_PAGE_SIZE)?;

        let mut criteria = CardSearchCriteria::new()
            .paginate(page, page_size)?
            .colors(parse_colors(self.colors.as_deref())?);

        if let Some(rarity) = parse_rarity(self.rarity.as_deref())? {
            criteria = criteria.rarity(rarity);
        }
        if let Some(text) = self.search_text {
            criteria = criteria.search_text(text);
        }
        if let Some(set_code) = self.set_code {
            criteria = criteria.set_code(set_code);
        }
        if let Some(type_line) = self.type_line {
            criteria = criteria.type_line(type_line);
        }

        Ok(criteria)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CardSearchResponse {
    pub items: Vec<CardSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CardPriceListResponse {
    pub items: Vec<CardPrice>,
}

// ============ Handlers ============

/// Search cards with optional, independent filters
#[utoipa::path(
    get,
    path = "/api/cards",
    params(CardSearchParams),
    responses(
        (status = 200, description = "One page of matching cards", body = CardSearchResponse),
        (status = 400, description = "Invalid parameter"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Cards"
)]
pub async fn search_cards(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<CardSearchParams>,
) -> AppResult<Json<CardSearchResponse>> {
    let criteria = params.into_criteria()?;
    let items = CardRepository::search(&state.pg_pool, &criteria).await?;

    tracing::debug!(
        page = criteria.page(),
        page_size = criteria.page_size(),
        returned = items.len(),
        "Card search"
    );

    Ok(Json(CardSearchResponse { items }))
}

/// Get a card by ID
#[utoipa::path(
    get,
    path = "/api/cards/{id}",
    params(
        ("id" = Uuid, Path, description = "Card ID")
    ),
    responses(
        (status = 200, description = "Card details", body = Card),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Card not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Cards"
)]
pub async fn get_card(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Card>> {
    let card = CardRepository::find_by_id(&state.db, id).await?;
    Ok(Json(card))
}

/// Price history of a card, newest first
#[utoipa::path(
    get,
    path = "/api/cards/{id}/prices",
    params(
        ("id" = Uuid, Path, description = "Card ID")
    ),
    responses(
        (status = 200, description = "Price history", body = CardPriceListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Card not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Cards"
)]
pub async fn card_prices(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CardPriceListResponse>> {
    CardRepository::find_by_id(&state.db, id).await?;
    let items = CardPriceRepository::list_by_card(&state.db, id).await?;
    Ok(Json(CardPriceListResponse { items }))
}

/// Upsert provider card records (admin only)
#[utoipa::path(
    post,
    path = "/api/cards/import",
    request_body = Vec<ScryfallCard>,
    responses(
        (status = 200, description = "Import finished", body = ImportSummary),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Cards"
)]
pub async fn import_cards(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Vec<ScryfallCard>>,
) -> AppResult<Json<ImportSummary>> {
    user.require_admin()?;

    tracing::info!(user_id = %user.id, records = payload.len(), "Card import requested");
    let summary = CardImportService::import(&state.db, &payload).await?;

    Ok(Json(summary))
}
