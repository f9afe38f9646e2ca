use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::card_price::{self, ActiveModel, Column, Entity as CardPriceEntity};
use crate::error::AppResult;
use crate::models::{CardPrice, NewCardPrice};

/// Price history repository
pub struct CardPriceRepository;

impl CardPriceRepository {
    /// Append a price observation for a card
    pub async fn record(
        db: &DatabaseConnection,
        card_id: Uuid,
        input: &NewCardPrice,
    ) -> AppResult<CardPrice> {
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            card_id: Set(card_id),
            price_usd: Set(input.price_usd),
            price_usd_foil: Set(input.price_usd_foil),
            price_eur: Set(input.price_eur),
            price_tix: Set(input.price_tix),
            recorded_at: Set(time::OffsetDateTime::now_utc()),
        };

        let result = model.insert(db).await?;
        Ok(result.into())
    }

    /// Newest observations first
    pub async fn list_by_card(db: &DatabaseConnection, card_id: Uuid) -> AppResult<Vec<CardPrice>> {
        let models = CardPriceEntity::find()
            .filter(Column::CardId.eq(card_id))
            .order_by_desc(Column::RecordedAt)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }
}

impl From<card_price::Model> for CardPrice {
    fn from(m: card_price::Model) -> Self {
        Self {
            id: m.id,
            card_id: m.card_id,
            price_usd: m.price_usd,
            price_usd_foil: m.price_usd_foil,
            price_eur: m.price_eur,
            price_tix: m.price_tix,
            recorded_at: m.recorded_at,
        }
    }
}
