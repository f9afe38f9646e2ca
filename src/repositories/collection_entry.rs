use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::card::Entity as CardEntity;
use crate::entity::collection_entry::{self, ActiveModel, Column, Entity as EntryEntity};
use crate::error::{AppError, AppResult};
use crate::models::{CollectionEntry, Condition, CreateCollectionEntry, UpdateCollectionEntry};

/// Collection entry repository. Every user-facing method is scoped to the owner.
pub struct CollectionEntryRepository;

impl CollectionEntryRepository {
    /// Add a card to a user's collection
    pub async fn create(
        db: &DatabaseConnection,
        user_id: Uuid,
        input: &CreateCollectionEntry,
    ) -> AppResult<CollectionEntry> {
        input.validate()?;

        CardEntity::find_by_id(input.card_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Card".to_string()))?;

        let now = time::OffsetDateTime::now_utc();
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            card_id: Set(input.card_id),
            quantity: Set(input.quantity),
            condition: Set(input.condition.as_str().to_string()),
            foil: Set(input.foil),
            acquired_date: Set(input.acquired_date),
            notes: Set(input.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = model.insert(db).await?;
        Ok(result.into())
    }

    /// Find an entry, hiding entries that belong to someone else
    pub async fn find_by_id_and_user(
        db: &DatabaseConnection,
        id: Uuid,
        user_id: Uuid,
    ) -> AppResult<CollectionEntry> {
        let model = EntryEntity::find_by_id(id)
            .filter(Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Collection entry".to_string()))?;

        Ok(model.into())
    }

    pub async fn list_by_user(
        db: &DatabaseConnection,
        user_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<CollectionEntry>> {
        let models = EntryEntity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    pub async fn count_by_user(db: &DatabaseConnection, user_id: Uuid) -> AppResult<u64> {
        let count = EntryEntity::find()
            .filter(Column::UserId.eq(user_id))
            .count(db)
            .await?;

        Ok(count)
    }

    /// Update an entry (with ownership check)
    pub async fn update(
        db: &DatabaseConnection,
        id: Uuid,
        user_id: Uuid,
        input: &UpdateCollectionEntry,
    ) -> AppResult<CollectionEntry> {
        input.validate()?;

        let model = EntryEntity::find_by_id(id)
            .filter(Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Collection entry".to_string()))?;

        let mut active: ActiveModel = model.into();

        if let Some(quantity) = input.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(condition) = input.condition {
            active.condition = Set(condition.as_str().to_string());
        }
        if let Some(foil) = input.foil {
            active.foil = Set(foil);
        }
        if let Some(acquired_date) = input.acquired_date {
            active.acquired_date = Set(Some(acquired_date));
        }
        if let Some(notes) = &input.notes {
            active.notes = Set(Some(notes.clone()));
        }
        active.updated_at = Set(time::OffsetDateTime::now_utc());

        let result = active.update(db).await?;
        Ok(result.into())
    }

    /// Delete an entry (with ownership check)
    pub async fn delete_for_user(db: &DatabaseConnection, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let result = EntryEntity::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::UserId.eq(user_id))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Collection entry".to_string()));
        }

        Ok(())
    }
}

impl From<collection_entry::Model> for CollectionEntry {
    fn from(m: collection_entry::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            card_id: m.card_id,
            quantity: m.quantity,
            // The column CHECK only admits known grades
            condition: m.condition.parse().unwrap_or(Condition::NearMint),
            foil: m.foil,
            acquired_date: m.acquired_date,
            notes: m.notes,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
