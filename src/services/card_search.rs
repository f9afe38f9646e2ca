use crate::error::{AppError, AppResult};
use crate::models::{Color, Rarity};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

const SELECT_CARDS: &str = "SELECT \
c.id, c.scryfall_id, c.oracle_text, c.name, c.set_code, c.set_name, c.rarity, \
c.mana_cost, c.type_line, c.colors, \
COALESCE(c.image_uris->>'normal', c.image_uris->>'png', c.image_uris->>'art_crop', \
c.image_uris->>'border_crop', c.image_uris->>'large', c.image_uris->>'small', '') AS image_uri, \
COALESCE(c.image_uris->>'small', '') AS image_uri_small, \
c.image_file, c.price_usd, c.last_updated \
FROM cards c \
LEFT JOIN oracle_texts o ON o.oracle_id = c.oracle_id";

/// Value for one numbered placeholder, in placeholder order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchBind {
    Text(String),
    TextArray(Vec<String>),
    Int(i64),
}

/// Validated card search filters plus pagination.
///
/// Every filter is optional and contributes exactly one conjunct to the
/// WHERE clause, so adding or removing one never changes another's predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSearchCriteria {
    page: u32,
    page_size: u32,
    search_text: Option<String>,
    set_code: Option<String>,
    type_line: Option<String>,
    rarity: Option<Rarity>,
    colors: Vec<Color>,
}

impl Default for CardSearchCriteria {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search_text: None,
            set_code: None,
            type_line: None,
            rarity: None,
            colors: Vec::new(),
        }
    }
}

impl CardSearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the 1-based page and its size
    pub fn paginate(mut self, page: u32, page_size: u32) -> AppResult<Self> {
        if page == 0 {
            return Err(AppError::InvalidParameter(
                "page must be a positive integer".to_string(),
            ));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(AppError::InvalidParameter(format!(
                "pageSize must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        self.page = page;
        self.page_size = page_size;
        Ok(self)
    }

    pub fn search_text(mut self, text: impl Into<String>) -> Self {
        self.search_text = non_empty(text.into());
        self
    }

    pub fn set_code(mut self, set_code: impl Into<String>) -> Self {
        self.set_code = non_empty(set_code.into());
        self
    }

    pub fn type_line(mut self, type_line: impl Into<String>) -> Self {
        self.type_line = non_empty(type_line.into());
        self
    }

    pub fn rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = Some(rarity);
        self
    }

    /// Cards must carry at least one of these colors. Duplicates collapse and
    /// the list is kept in WUBRG order.
    pub fn colors(mut self, colors: impl IntoIterator<Item = Color>) -> Self {
        let mut colors: Vec<Color> = colors.into_iter().collect();
        colors.sort();
        colors.dedup();
        self.colors = colors;
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    /// Render the SELECT and the values for its `$n` placeholders
    pub fn build_query(&self) -> (String, Vec<SearchBind>) {
        let mut binds = Vec::new();
        let mut conditions = vec!["1 = 1".to_string()];

        if let Some(text) = &self.search_text {
            let exact = push(&mut binds, SearchBind::Text(text.clone()));
            let like = push(
                &mut binds,
                SearchBind::Text(format!("%{}%", escape_like(text))),
            );
            conditions.push(format!(
                "(o.oracle_text = ${} OR c.name LIKE ${})",
                exact, like
            ));
        }

        if let Some(set_code) = &self.set_code {
            let n = push(&mut binds, SearchBind::Text(set_code.clone()));
            conditions.push(format!("c.set_code = ${}", n));
        }

        if let Some(type_line) = &self.type_line {
            let n = push(&mut binds, SearchBind::Text(type_line.clone()));
            conditions.push(format!("c.type_line = ${}", n));
        }

        if let Some(rarity) = self.rarity {
            let n = push(&mut binds, SearchBind::Text(rarity.as_str().to_string()));
            conditions.push(format!("c.rarity = ${}", n));
        }

        if !self.colors.is_empty() {
            let codes = self.colors.iter().map(|c| c.code().to_string()).collect();
            let n = push(&mut binds, SearchBind::TextArray(codes));
            conditions.push(format!("c.colors && ${}::text[]", n));
        }

        let mut query = String::from(SELECT_CARDS);
        query.push_str(" WHERE ");
        query.push_str(&conditions.join(" AND "));
        query.push_str(" ORDER BY c.rank ASC NULLS LAST, c.name ASC, c.id ASC");

        let limit = push(&mut binds, SearchBind::Int(self.page_size as i64));
        let offset = push(&mut binds, SearchBind::Int(self.offset()));
        query.push_str(&format!(" LIMIT ${} OFFSET ${}", limit, offset));

        (query, binds)
    }
}

fn push(binds: &mut Vec<SearchBind>, bind: SearchBind) -> usize {
    binds.push(bind);
    binds.len()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Escape LIKE wildcards so user text only matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Parse a positive integer query parameter, using `default` when absent
pub fn parse_positive(raw: Option<&str>, name: &str, default: u32) -> AppResult<u32> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(default);
    };

    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(AppError::InvalidParameter(format!(
            "{} must be a positive integer, got '{}'",
            name, raw
        ))),
    }
}

/// Parse a comma-separated color list such as `U,b, G`
pub fn parse_colors(raw: Option<&str>) -> AppResult<Vec<Color>> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(Vec::new());
    };

    let colors = raw
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| code.parse::<Color>().map_err(AppError::InvalidParameter))
        .collect::<AppResult<Vec<Color>>>()?;

    if colors.is_empty() {
        return Err(AppError::InvalidParameter(
            "colors must list at least one of W, U, B, R, G".to_string(),
        ));
    }

    Ok(colors)
}

/// Parse an optional rarity filter
pub fn parse_rarity(raw: Option<&str>) -> AppResult<Option<Rarity>> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => raw
            .parse::<Rarity>()
            .map(Some)
            .map_err(AppError::InvalidParameter),
        None => Ok(None),
    }
}
