use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const MAX_NOTES_LEN: usize = 1000;

/// Physical condition grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Condition {
    #[serde(rename = "NM")]
    NearMint,
    #[serde(rename = "LP")]
    LightlyPlayed,
    #[serde(rename = "MP")]
    ModeratelyPlayed,
    #[serde(rename = "HP")]
    HeavilyPlayed,
    #[serde(rename = "DMG")]
    Damaged,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NearMint => "NM",
            Self::LightlyPlayed => "LP",
            Self::ModeratelyPlayed => "MP",
            Self::HeavilyPlayed => "HP",
            Self::Damaged => "DMG",
        }
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NM" => Ok(Self::NearMint),
            "LP" => Ok(Self::LightlyPlayed),
            "MP" => Ok(Self::ModeratelyPlayed),
            "HP" => Ok(Self::HeavilyPlayed),
            "DMG" => Ok(Self::Damaged),
            other => Err(format!("unknown condition '{}'", other)),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's ownership record for one card
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub card_id: Uuid,
    pub quantity: i32,
    pub condition: Condition,
    pub foil: bool,
    #[schema(value_type = Option<String>, format = Date)]
    pub acquired_date: Option<Date>,
    pub notes: Option<String>,
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
    #[schema(value_type = String)]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateCollectionEntry {
    pub card_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default = "default_condition")]
    pub condition: Condition,
    #[serde(default)]
    pub foil: bool,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = Date)]
    pub acquired_date: Option<Date>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateCollectionEntry {
    pub fn validate(&self) -> AppResult<()> {
        validate_quantity(self.quantity)?;
        validate_notes(self.notes.as_deref())
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateCollectionEntry {
    pub quantity: Option<i32>,
    pub condition: Option<Condition>,
    pub foil: Option<bool>,
    #[schema(value_type = Option<String>, format = Date)]
    pub acquired_date: Option<Date>,
    pub notes: Option<String>,
}

impl UpdateCollectionEntry {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(quantity) = self.quantity {
            validate_quantity(quantity)?;
        }
        validate_notes(self.notes.as_deref())
    }
}

fn default_quantity() -> i32 {
    1
}

fn default_condition() -> Condition {
    Condition::NearMint
}

fn validate_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".to_string()));
    }
    Ok(())
}

fn validate_notes(notes: Option<&str>) -> AppResult<()> {
    match notes {
        Some(notes) if notes.chars().count() > MAX_NOTES_LEN => Err(AppError::Validation(
            format!("notes must be at most {} characters", MAX_NOTES_LEN),
        )),
        _ => Ok(()),
    }
}
