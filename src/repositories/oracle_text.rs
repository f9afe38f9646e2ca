use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, Set};

use crate::entity::oracle_text::{ActiveModel, Column, Entity as OracleTextEntity};
use crate::error::AppResult;

/// Oracle text shadow table, written on import and read by card search
pub struct OracleTextRepository;

impl OracleTextRepository {
    /// Store the rules text for an oracle id unless one is already present.
    /// Returns whether a row was inserted.
    pub async fn insert_missing(
        db: &DatabaseConnection,
        oracle_id: &str,
        oracle_text: &str,
    ) -> AppResult<bool> {
        let model = ActiveModel {
            oracle_id: Set(oracle_id.to_string()),
            oracle_text: Set(oracle_text.to_string()),
        };

        let result = OracleTextEntity::insert(model)
            .on_conflict(OnConflict::column(Column::OracleId).do_nothing().to_owned())
            .exec(db)
            .await;

        match result {
            Ok(_) => Ok(true),
            // Conflicting insert with DO NOTHING reports no rows
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find(db: &DatabaseConnection, oracle_id: &str) -> AppResult<Option<String>> {
        let model = OracleTextEntity::find_by_id(oracle_id.to_string())
            .one(db)
            .await?;

        Ok(model.map(|m| m.oracle_text))
    }
}
