use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub scryfall_id: String,
    pub oracle_id: Option<String>,
    pub name: String,
    pub set_code: String,
    pub set_name: String,
    pub rarity: String,
    pub mana_cost: Option<String>,
    pub type_line: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub oracle_text: Option<String>,
    pub colors: Vec<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub image_uris: Option<Json>,
    pub image_file: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub price_usd: Option<Decimal>,
    pub rank: Option<i32>,
    pub last_updated: Option<TimeDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::collection_entry::Entity")]
    CollectionEntries,
    #[sea_orm(has_many = "super::card_price::Entity")]
    Prices,
}

impl Related<super::collection_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionEntries.def()
    }
}

impl Related<super::card_price::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
