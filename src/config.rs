use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,
    pub redis_url: String,

    // JWT
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,

    // Server
    pub host: String,
    pub port: u16,

    // Emails that receive the admin role on registration
    pub admin_emails: Vec<String>,

    // Image sync
    pub image_dir: PathBuf,
    pub image_sync_batch_size: u64,
    pub image_sync_concurrency: usize,
    pub image_fetch_timeout_seconds: u64,
    pub image_user_agent: String,
    /// An `in_progress` row untouched for this long counts as abandoned
    pub sync_stale_after_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if exists

        Ok(Self {
            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            redis_url: env::var("REDIS_URL").map_err(|_| ConfigError::Missing("REDIS_URL"))?,

            // JWT
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            jwt_expiration_hours: parse_or("JWT_EXPIRATION_HOURS", 24)?,

            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 3000)?,

            admin_emails: env::var("ADMIN_EMAILS")
                .map(|raw| parse_email_list(&raw))
                .unwrap_or_default(),

            // Image sync
            image_dir: env::var("IMAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/images")),
            image_sync_batch_size: positive_or("IMAGE_SYNC_BATCH_SIZE", 100)?,
            image_sync_concurrency: positive_or("IMAGE_SYNC_CONCURRENCY", 4)?,
            image_fetch_timeout_seconds: positive_or("IMAGE_FETCH_TIMEOUT_SECONDS", 30)?,
            image_user_agent: env::var("IMAGE_USER_AGENT")
                .unwrap_or_else(|_| "Spell-Binder-Catalog/1.0".to_string()),
            sync_stale_after_seconds: positive_or("SYNC_STALE_AFTER_SECONDS", 3600)?,
        })
    }

    /// Get server address as "host:port"
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether an email is configured to receive the admin role
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email.trim()))
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn positive_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value = parse_or(key, default)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid(key));
    }
    Ok(value)
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid environment variable: {0}")]
    Invalid(&'static str),
}
