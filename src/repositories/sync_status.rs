use std::time::Duration;

use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entity::sync_status::{self, ActiveModel, Column, Entity as SyncStatusEntity};
use crate::error::{AppError, AppResult};
use crate::models::{SyncDataType, SyncState, SyncStatusRecord};

const MAX_ERROR_MESSAGE_LEN: usize = 1000;

/// Sync status repository, one row per data type
pub struct SyncStatusRepository;

impl SyncStatusRepository {
    pub async fn find(
        db: &DatabaseConnection,
        data_type: SyncDataType,
    ) -> AppResult<Option<SyncStatusRecord>> {
        let model = SyncStatusEntity::find()
            .filter(Column::DataType.eq(data_type.as_str()))
            .one(db)
            .await?;

        model.map(SyncStatusRecord::try_from).transpose()
    }

    pub async fn list(db: &DatabaseConnection) -> AppResult<Vec<SyncStatusRecord>> {
        let models = SyncStatusEntity::find()
            .order_by_asc(Column::DataType)
            .all(db)
            .await?;

        models.into_iter().map(SyncStatusRecord::try_from).collect()
    }

    /// Write the status for a data type, creating the row on first use
    pub async fn upsert_status(
        db: &DatabaseConnection,
        data_type: SyncDataType,
        status: SyncState,
        records_processed: u64,
        error_message: Option<&str>,
    ) -> AppResult<()> {
        if status == SyncState::NotStarted {
            return Err(AppError::Internal(
                "not_started is not a storable sync status".to_string(),
            ));
        }

        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            data_type: Set(data_type.as_str().to_string()),
            status: Set(status.as_str().to_string()),
            last_sync: Set(Some(time::OffsetDateTime::now_utc())),
            records_processed: Set(i32::try_from(records_processed).unwrap_or(i32::MAX)),
            error_message: Set(error_message.map(truncate_message)),
        };

        SyncStatusEntity::insert(model)
            .on_conflict(
                OnConflict::column(Column::DataType)
                    .update_columns([
                        Column::Status,
                        Column::LastSync,
                        Column::RecordsProcessed,
                        Column::ErrorMessage,
                    ])
                    .to_owned(),
            )
            .exec(db)
            .await?;

        Ok(())
    }

    /// Atomically move a data type to `in_progress`.
    ///
    /// Returns `false` without touching the row when a run is already in
    /// progress, so only one of several concurrent callers wins. A running
    /// row whose `last_sync` is older than `stale_after` belongs to a dead
    /// worker and is taken over.
    pub async fn try_begin(
        pool: &PgPool,
        data_type: SyncDataType,
        stale_after: Duration,
    ) -> AppResult<bool> {
        let started: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO sync_status (id, data_type, status, last_sync, records_processed, error_message)
            VALUES ($1, $2, 'in_progress', NOW(), 0, NULL)
            ON CONFLICT (data_type) DO UPDATE
            SET status = 'in_progress',
                last_sync = NOW(),
                records_processed = 0,
                error_message = NULL
            WHERE sync_status.status <> 'in_progress'
               OR sync_status.last_sync IS NULL
               OR sync_status.last_sync < NOW() - ($3::float8 * INTERVAL '1 second')
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data_type.as_str())
        .bind(stale_after.as_secs_f64())
        .fetch_optional(pool)
        .await?;

        Ok(started.is_some())
    }
}

fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}

impl TryFrom<sync_status::Model> for SyncStatusRecord {
    type Error = AppError;

    fn try_from(m: sync_status::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: m.id,
            data_type: m.data_type.parse().map_err(AppError::Internal)?,
            status: m.status.parse().map_err(AppError::Internal)?,
            last_sync: m.last_sync,
            records_processed: m.records_processed,
            error_message: m.error_message,
        })
    }
}
