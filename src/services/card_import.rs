use std::str::FromStr;

use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppResult;
use crate::models::{Color, NewCard, NewCardPrice, Rarity, SyncDataType, SyncState};
use crate::repositories::{
    CardPriceRepository, CardRepository, OracleTextRepository, SyncStatusRepository,
};

/// Card record in the provider's bulk-data shape. Only the fields the
/// catalog keeps are read; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ScryfallCard {
    pub id: Option<String>,
    pub oracle_id: Option<String>,
    pub name: Option<String>,
    pub set: Option<String>,
    pub set_name: Option<String>,
    pub rarity: Option<String>,
    pub mana_cost: Option<String>,
    pub type_line: Option<String>,
    pub oracle_text: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[schema(value_type = Option<Object>)]
    pub image_uris: Option<serde_json::Value>,
    #[serde(default)]
    pub card_faces: Vec<ScryfallCardFace>,
    pub edhrec_rank: Option<i32>,
    pub prices: Option<ScryfallPrices>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ScryfallCardFace {
    #[schema(value_type = Option<Object>)]
    pub image_uris: Option<serde_json::Value>,
}

/// Prices arrive as decimal strings
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ScryfallPrices {
    pub usd: Option<String>,
    pub usd_foil: Option<String>,
    pub eur: Option<String>,
    pub tix: Option<String>,
}

impl ScryfallPrices {
    fn to_new_price(&self) -> NewCardPrice {
        NewCardPrice {
            price_usd: parse_price(self.usd.as_deref()),
            price_usd_foil: parse_price(self.usd_foil.as_deref()),
            price_eur: parse_price(self.eur.as_deref()),
            price_tix: parse_price(self.tix.as_deref()),
        }
    }
}

impl ScryfallCard {
    /// Map to an upsert. `None` when id, name or set is missing.
    pub fn to_new_card(&self) -> Option<NewCard> {
        let scryfall_id = required(self.id.as_deref())?;
        let name = required(self.name.as_deref())?;
        let set_code = required(self.set.as_deref())?;

        // Double-faced cards carry their images on the front face
        let image_uris = self.image_uris.clone().or_else(|| {
            self.card_faces
                .first()
                .and_then(|face| face.image_uris.clone())
        });

        Some(NewCard {
            scryfall_id,
            oracle_id: self.oracle_id.clone().filter(|id| !id.is_empty()),
            name,
            set_code,
            set_name: self.set_name.clone().unwrap_or_default(),
            rarity: self
                .rarity
                .as_deref()
                .and_then(|r| r.parse().ok())
                .unwrap_or(Rarity::Common),
            mana_cost: self.mana_cost.clone().filter(|m| !m.is_empty()),
            type_line: self.type_line.clone().unwrap_or_default(),
            oracle_text: self.oracle_text.clone().filter(|t| !t.is_empty()),
            colors: self
                .colors
                .iter()
                .filter_map(|c| c.parse::<Color>().ok())
                .collect(),
            image_uris,
            price_usd: self
                .prices
                .as_ref()
                .and_then(|p| parse_price(p.usd.as_deref())),
            rank: self.edhrec_rank,
        })
    }
}

fn required(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_price(raw: Option<&str>) -> Option<Decimal> {
    raw.and_then(|r| Decimal::from_str(r.trim()).ok())
}

/// Counters for one import call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportSummary {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
}

pub struct CardImportService;

impl CardImportService {
    /// Upsert a batch of provider records into the catalog.
    ///
    /// A record that fails to save is counted and logged; the rest of the
    /// batch still goes through.
    pub async fn import(db: &DatabaseConnection, cards: &[ScryfallCard]) -> AppResult<ImportSummary> {
        let mut summary = ImportSummary::default();

        for record in cards {
            let Some(new_card) = record.to_new_card() else {
                tracing::debug!(id = ?record.id, name = ?record.name, "Skipping card with missing required fields");
                summary.skipped += 1;
                continue;
            };

            match Self::import_one(db, record, &new_card).await {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    tracing::warn!(scryfall_id = %new_card.scryfall_id, error = %e, "Failed to import card");
                    summary.failed += 1;
                }
            }
        }

        let status = match (summary.processed, summary.failed) {
            (_, 0) => SyncState::Success,
            (0, _) => SyncState::Failed,
            _ => SyncState::Partial,
        };
        let error_message =
            (summary.failed > 0).then(|| format!("{} cards failed to import", summary.failed));
        SyncStatusRepository::upsert_status(
            db,
            SyncDataType::Cards,
            status,
            summary.processed,
            error_message.as_deref(),
        )
        .await?;

        tracing::info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Card import finished"
        );

        Ok(summary)
    }

    async fn import_one(
        db: &DatabaseConnection,
        record: &ScryfallCard,
        new_card: &NewCard,
    ) -> AppResult<()> {
        let card = CardRepository::upsert(db, new_card).await?;

        if let (Some(oracle_id), Some(oracle_text)) = (&new_card.oracle_id, &new_card.oracle_text) {
            OracleTextRepository::insert_missing(db, oracle_id, oracle_text).await?;
        }

        if let Some(prices) = &record.prices {
            let price = prices.to_new_price();
            if !price.is_empty() {
                CardPriceRepository::record(db, card.id, &price).await?;
            }
        }

        Ok(())
    }
}
