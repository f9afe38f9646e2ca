use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Printing rarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Mythic,
    Special,
    Bonus,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Mythic => "mythic",
            Self::Special => "special",
            Self::Bonus => "bonus",
        }
    }
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "common" => Ok(Self::Common),
            "uncommon" => Ok(Self::Uncommon),
            "rare" => Ok(Self::Rare),
            "mythic" => Ok(Self::Mythic),
            "special" => Ok(Self::Special),
            "bonus" => Ok(Self::Bonus),
            other => Err(format!("unknown rarity '{}'", other)),
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the five colors, stored as its single-letter code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Color {
    White,
    Blue,
    Black,
    Red,
    Green,
}

impl Color {
    pub fn code(&self) -> &'static str {
        match self {
            Self::White => "W",
            Self::Blue => "U",
            Self::Black => "B",
            Self::Red => "R",
            Self::Green => "G",
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "W" => Ok(Self::White),
            "U" => Ok(Self::Blue),
            "B" => Ok(Self::Black),
            "R" => Ok(Self::Red),
            "G" => Ok(Self::Green),
            other => Err(format!("unknown color '{}'", other)),
        }
    }
}

/// Full card record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Card {
    pub id: Uuid,
    pub scryfall_id: String,
    pub oracle_id: Option<String>,
    pub name: String,
    pub set_code: String,
    pub set_name: String,
    pub rarity: String,
    pub mana_cost: Option<String>,
    pub type_line: String,
    pub oracle_text: Option<String>,
    pub colors: Vec<String>,
    #[schema(value_type = Option<Object>)]
    pub image_uris: Option<serde_json::Value>,
    pub image_file: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price_usd: Option<Decimal>,
    pub rank: Option<i32>,
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>)]
    pub last_updated: Option<OffsetDateTime>,
}

impl Card {
    /// Image URL to download, by preference: normal, large, png, small
    pub fn download_uri(&self) -> Option<&str> {
        let uris = self.image_uris.as_ref()?.as_object()?;
        ["normal", "large", "png", "small"]
            .iter()
            .filter_map(|size| uris.get(*size).and_then(|v| v.as_str()))
            .find(|uri| !uri.is_empty())
    }
}

/// Card projection returned by the search endpoint
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CardSummary {
    pub id: Uuid,
    pub scryfall_id: String,
    pub oracle_text: Option<String>,
    pub name: String,
    pub set_code: String,
    pub set_name: String,
    pub rarity: String,
    pub mana_cost: Option<String>,
    pub type_line: String,
    pub colors: Vec<String>,
    pub image_uri: String,
    pub image_uri_small: String,
    pub image_file: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price_usd: Option<Decimal>,
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>)]
    pub last_updated: Option<OffsetDateTime>,
}

/// Card upsert input, keyed by `scryfall_id`
#[derive(Debug, Clone)]
pub struct NewCard {
    pub scryfall_id: String,
    pub oracle_id: Option<String>,
    pub name: String,
    pub set_code: String,
    pub set_name: String,
    pub rarity: Rarity,
    pub mana_cost: Option<String>,
    pub type_line: String,
    pub oracle_text: Option<String>,
    pub colors: Vec<Color>,
    pub image_uris: Option<serde_json::Value>,
    pub price_usd: Option<Decimal>,
    pub rank: Option<i32>,
}

/// One observation in a card's price history
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CardPrice {
    pub id: Uuid,
    pub card_id: Uuid,
    #[schema(value_type = Option<String>)]
    pub price_usd: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub price_usd_foil: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub price_eur: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub price_tix: Option<Decimal>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String)]
    pub recorded_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct NewCardPrice {
    pub price_usd: Option<Decimal>,
    pub price_usd_foil: Option<Decimal>,
    pub price_eur: Option<Decimal>,
    pub price_tix: Option<Decimal>,
}

impl NewCardPrice {
    pub fn is_empty(&self) -> bool {
        self.price_usd.is_none()
            && self.price_usd_foil.is_none()
            && self.price_eur.is_none()
            && self.price_tix.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card_with_uris(uris: Option<serde_json::Value>) -> Card {
        Card {
            id: Uuid::new_v4(),
            scryfall_id: "abc".to_string(),
            oracle_id: None,
            name: "Opt".to_string(),
            set_code: "xln".to_string(),
            set_name: "Ixalan".to_string(),
            rarity: "common".to_string(),
            mana_cost: Some("{U}".to_string()),
            type_line: "Instant".to_string(),
            oracle_text: None,
            colors: vec!["U".to_string()],
            image_uris: uris,
            image_file: None,
            price_usd: None,
            rank: None,
            last_updated: None,
        }
    }

    #[test]
    fn test_rarity_parse_is_case_insensitive() {
        assert_eq!("Mythic".parse::<Rarity>().unwrap(), Rarity::Mythic);
        assert!("legendary".parse::<Rarity>().is_err());
    }

    #[test]
    fn test_color_codes() {
        assert_eq!("u".parse::<Color>().unwrap(), Color::Blue);
        assert_eq!(Color::Black.code(), "B");
        assert!("C".parse::<Color>().is_err());
    }

    #[test]
    fn test_download_uri_prefers_normal() {
        let card = card_with_uris(Some(json!({
            "small": "https://img.example/small.jpg",
            "normal": "https://img.example/normal.jpg"
        })));
        assert_eq!(card.download_uri(), Some("https://img.example/normal.jpg"));
    }

    #[test]
    fn test_download_uri_skips_empty_values() {
        let card = card_with_uris(Some(json!({
            "normal": "",
            "png": "https://img.example/card.png"
        })));
        assert_eq!(card.download_uri(), Some("https://img.example/card.png"));
        assert_eq!(card_with_uris(None).download_uri(), None);
    }
}
