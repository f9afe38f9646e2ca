use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entity::card::{self, ActiveModel, Column, Entity as CardEntity};
use crate::error::{AppError, AppResult};
use crate::models::{Card, CardSummary, NewCard};
use crate::services::card_search::{CardSearchCriteria, SearchBind};

/// SQL twin of `Card::download_uri`
const HAS_DOWNLOAD_URI: &str = "COALESCE(\
    NULLIF(image_uris->>'normal', ''), \
    NULLIF(image_uris->>'large', ''), \
    NULLIF(image_uris->>'png', ''), \
    NULLIF(image_uris->>'small', '')) IS NOT NULL";

/// Card repository for database operations
pub struct CardRepository;

impl CardRepository {
    pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> AppResult<Card> {
        let model = CardEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Card".to_string()))?;

        Ok(model.into())
    }

    /// Run a card search and return one page of projections
    pub async fn search(pool: &PgPool, criteria: &CardSearchCriteria) -> AppResult<Vec<CardSummary>> {
        let (sql, binds) = criteria.build_query();
        tracing::debug!(sql = %sql, binds = binds.len(), "Executing card search");

        let mut query = sqlx::query_as::<_, CardSummary>(&sql);
        for bind in binds {
            query = match bind {
                SearchBind::Text(value) => query.bind(value),
                SearchBind::TextArray(values) => query.bind(values),
                SearchBind::Int(value) => query.bind(value),
            };
        }

        let cards = query.fetch_all(pool).await?;
        Ok(cards)
    }

    /// Insert a card or refresh the existing printing with the same `scryfall_id`.
    /// A previously downloaded `image_file` is kept.
    pub async fn upsert(db: &DatabaseConnection, input: &NewCard) -> AppResult<Card> {
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            scryfall_id: Set(input.scryfall_id.clone()),
            oracle_id: Set(input.oracle_id.clone()),
            name: Set(input.name.clone()),
            set_code: Set(input.set_code.clone()),
            set_name: Set(input.set_name.clone()),
            rarity: Set(input.rarity.as_str().to_string()),
            mana_cost: Set(input.mana_cost.clone()),
            type_line: Set(input.type_line.clone()),
            oracle_text: Set(input.oracle_text.clone()),
            colors: Set(input.colors.iter().map(|c| c.code().to_string()).collect()),
            image_uris: Set(input.image_uris.clone()),
            image_file: Set(None),
            price_usd: Set(input.price_usd),
            rank: Set(input.rank),
            last_updated: Set(Some(time::OffsetDateTime::now_utc())),
        };

        let result = CardEntity::insert(model)
            .on_conflict(
                OnConflict::column(Column::ScryfallId)
                    .update_columns([
                        Column::OracleId,
                        Column::Name,
                        Column::SetCode,
                        Column::SetName,
                        Column::Rarity,
                        Column::ManaCost,
                        Column::TypeLine,
                        Column::OracleText,
                        Column::Colors,
                        Column::ImageUris,
                        Column::PriceUsd,
                        Column::Rank,
                        Column::LastUpdated,
                    ])
                    .to_owned(),
            )
            .exec_with_returning(db)
            .await?;

        Ok(result.into())
    }

    /// Next batch of cards that have image URLs but no local file, ordered by id
    pub async fn list_needing_images(
        db: &DatabaseConnection,
        after: Option<Uuid>,
        limit: u64,
    ) -> AppResult<Vec<Card>> {
        let mut query = CardEntity::find()
            .filter(Column::ImageFile.is_null())
            .filter(Column::ImageUris.is_not_null());

        if let Some(after) = after {
            query = query.filter(Column::Id.gt(after));
        }

        let models = query.order_by_asc(Column::Id).limit(limit).all(db).await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    /// Record the downloaded image path for a card
    pub async fn set_image_file(db: &DatabaseConnection, id: Uuid, image_file: &str) -> AppResult<()> {
        let model = CardEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Card".to_string()))?;

        let mut active: ActiveModel = model.into();
        active.image_file = Set(Some(image_file.to_string()));
        active.update(db).await?;

        Ok(())
    }

    /// Cards a run can still download. Cards whose `image_uris` has none of
    /// the sizes `Card::download_uri` accepts are skipped forever and left out.
    pub async fn count_needing_images(db: &DatabaseConnection) -> AppResult<u64> {
        let count = CardEntity::find()
            .filter(Column::ImageFile.is_null())
            .filter(Column::ImageUris.is_not_null())
            .filter(Expr::cust(HAS_DOWNLOAD_URI))
            .count(db)
            .await?;

        Ok(count)
    }

    pub async fn count_with_images(db: &DatabaseConnection) -> AppResult<u64> {
        let count = CardEntity::find()
            .filter(Column::ImageFile.is_not_null())
            .count(db)
            .await?;

        Ok(count)
    }
}

impl From<card::Model> for Card {
    fn from(m: card::Model) -> Self {
        Self {
            id: m.id,
            scryfall_id: m.scryfall_id,
            oracle_id: m.oracle_id,
            name: m.name,
            set_code: m.set_code,
            set_name: m.set_name,
            rarity: m.rarity,
            mana_cost: m.mana_cost,
            type_line: m.type_line,
            oracle_text: m.oracle_text,
            colors: m.colors,
            image_uris: m.image_uris,
            image_file: m.image_file,
            price_usd: m.price_usd,
            rank: m.rank,
            last_updated: m.last_updated,
        }
    }
}
