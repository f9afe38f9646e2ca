use anyhow::Context;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use spell_binder::config::Config;
use spell_binder::handlers::{
    AuthResponse, CardPriceListResponse, CardSearchResponse, CollectionEntryListResponse,
    LoginRequest, RegisterRequest, SyncJobResponse, SyncStatusListResponse,
};
use spell_binder::models::{
    Card, CardPrice, CardSummary, CollectionEntry, Condition, CreateCollectionEntry,
    ImageSyncProgress, ImageSyncResult, ProgressEnvelope, SyncDataType, SyncState,
    SyncStatusRecord, UpdateCollectionEntry, UserResponse,
};
use spell_binder::services::card_import::{ScryfallCardFace, ScryfallPrices};
use spell_binder::services::{ImportSummary, ScryfallCard};
use spell_binder::state::AppState;
use spell_binder::{build_router, handlers, telemetry};

/// Security scheme for Bearer token
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::me,
        handlers::card::search_cards,
        handlers::card::get_card,
        handlers::card::card_prices,
        handlers::card::import_cards,
        handlers::collection::create_entry,
        handlers::collection::list_entries,
        handlers::collection::get_entry,
        handlers::collection::update_entry,
        handlers::collection::delete_entry,
        handlers::sync::start_image_sync,
        handlers::sync::image_sync_progress,
        handlers::sync::list_sync_status,
        handlers::sync::get_sync_job,
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        AuthResponse,
        UserResponse,
        Card,
        CardSummary,
        CardPrice,
        CardSearchResponse,
        CardPriceListResponse,
        ScryfallCard,
        ScryfallCardFace,
        ScryfallPrices,
        ImportSummary,
        Condition,
        CollectionEntry,
        CreateCollectionEntry,
        UpdateCollectionEntry,
        CollectionEntryListResponse,
        SyncDataType,
        SyncState,
        SyncStatusRecord,
        ImageSyncProgress,
        ImageSyncResult,
        ProgressEnvelope,
        SyncStatusListResponse,
        SyncJobResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Cards", description = "Card catalog search and import"),
        (name = "Collection", description = "Per-user card collection"),
        (name = "Sync", description = "Image download sync and status")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("spell_binder=debug,tower_http=debug");

    let config = Config::from_env().context("Failed to load configuration")?;
    let addr = config.server_addr();

    tracing::info!("Connecting to databases...");
    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;
    tracing::info!("Database connections established");

    let app = build_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server started on http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
