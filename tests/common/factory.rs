use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use spell_binder::models::{
    Card, CollectionEntry, Color, CreateCollectionEntry, CreateUser, NewCard, Rarity, User,
    UserRole,
};
use spell_binder::repositories::{
    CardRepository, CollectionEntryRepository, OracleTextRepository, UserRepository,
};
use spell_binder::services::AuthService;
use spell_binder::state::AppState;

/// Authentication info for tests
pub struct TestAuth {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

impl TestAuth {
    /// Get the Authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Card attributes a test cares about; the rest get defaults
pub struct CardSpec<'a> {
    pub name: &'a str,
    pub set_code: &'a str,
    pub rarity: Rarity,
    pub type_line: &'a str,
    pub colors: Vec<Color>,
    pub oracle_text: Option<&'a str>,
    pub rank: Option<i32>,
    pub image_uris: Option<serde_json::Value>,
}

impl<'a> CardSpec<'a> {
    pub fn new(name: &'a str, set_code: &'a str) -> Self {
        Self {
            name,
            set_code,
            rarity: Rarity::Common,
            type_line: "Instant",
            colors: Vec::new(),
            oracle_text: None,
            rank: None,
            image_uris: None,
        }
    }

    pub fn rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn type_line(mut self, type_line: &'a str) -> Self {
        self.type_line = type_line;
        self
    }

    pub fn colors(mut self, colors: &[Color]) -> Self {
        self.colors = colors.to_vec();
        self
    }

    pub fn oracle_text(mut self, text: &'a str) -> Self {
        self.oracle_text = Some(text);
        self
    }

    pub fn rank(mut self, rank: i32) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn image(mut self, url: &str) -> Self {
        self.image_uris = Some(json!({ "normal": url, "small": url }));
        self
    }
}

/// Short set code unique to one test run, so searches only see that test's cards
pub fn unique_set_code() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("t{}", &id[..7])
}

/// Factory for creating test data
pub struct Factory<'a> {
    state: &'a AppState,
}

impl<'a> Factory<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Create a member user and return auth info
    pub async fn create_user(&self) -> TestAuth {
        self.create_user_with_role(UserRole::Member).await
    }

    pub async fn create_admin(&self) -> TestAuth {
        self.create_user_with_role(UserRole::Admin).await
    }

    async fn create_user_with_role(&self, role: UserRole) -> TestAuth {
        let unique_id = Uuid::new_v4();
        let email = format!("test-{}@example.com", unique_id);
        let password = "TestPassword123!";

        let input = CreateUser {
            email: email.clone(),
            password: password.to_string(),
            name: format!("Test User {}", unique_id),
            role,
        };

        let password_hash = AuthService::hash_password(password).unwrap();
        let user = UserRepository::create(&self.state.db, &input, &password_hash)
            .await
            .unwrap();

        let token =
            AuthService::generate_token(user.id, &email, role, &self.state.config).unwrap();

        TestAuth {
            user_id: user.id,
            email,
            token,
        }
    }

    /// Create a member with a specific email
    pub async fn create_user_with_email(&self, email: &str, password: &str) -> User {
        let input = CreateUser {
            email: email.to_string(),
            password: password.to_string(),
            name: "Test User".to_string(),
            role: UserRole::Member,
        };

        let password_hash = AuthService::hash_password(password).unwrap();
        UserRepository::create(&self.state.db, &input, &password_hash)
            .await
            .unwrap()
    }

    /// Create a card, plus its oracle text row when it has one
    pub async fn create_card(&self, spec: CardSpec<'_>) -> Card {
        let oracle_id = spec.oracle_text.map(|_| Uuid::new_v4().to_string());

        let input = NewCard {
            scryfall_id: Uuid::new_v4().to_string(),
            oracle_id: oracle_id.clone(),
            name: spec.name.to_string(),
            set_code: spec.set_code.to_string(),
            set_name: format!("Set {}", spec.set_code),
            rarity: spec.rarity,
            mana_cost: None,
            type_line: spec.type_line.to_string(),
            oracle_text: spec.oracle_text.map(str::to_string),
            colors: spec.colors,
            image_uris: spec.image_uris,
            price_usd: Some(Decimal::new(25, 2)),
            rank: spec.rank,
        };

        let card = CardRepository::upsert(&self.state.db, &input).await.unwrap();

        if let (Some(oracle_id), Some(text)) = (oracle_id, spec.oracle_text) {
            OracleTextRepository::insert_missing(&self.state.db, &oracle_id, text)
                .await
                .unwrap();
        }

        card
    }

    /// Add a card to a user's collection
    pub async fn create_entry(&self, user_id: Uuid, card_id: Uuid) -> CollectionEntry {
        let input: CreateCollectionEntry =
            serde_json::from_value(json!({ "card_id": card_id })).unwrap();

        CollectionEntryRepository::create(&self.state.db, user_id, &input)
            .await
            .unwrap()
    }
}
