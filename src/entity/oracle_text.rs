use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Search shadow table keyed by oracle id
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oracle_texts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub oracle_id: String,
    #[sea_orm(column_type = "Text")]
    pub oracle_text: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
