/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: Bind address (default: 0.0.0.0:8000)
/// - `CORS_ORIGIN`: Comma-separated allowed origins (default: http://localhost:5173)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `ACCESS_TOKEN_SECRET` / `REFRESH_TOKEN_SECRET`: HMAC secrets, at least 32 chars, distinct
/// - `ACCESS_TOKEN_EXPIRY` / `REFRESH_TOKEN_EXPIRY`: Lifetimes like `15m`, `1d` (default: 1d / 10d)
/// - `PUBLIC_BASE_URL`: Base of verification links (default: http://localhost:8000)
/// - `FORGOT_PASSWORD_REDIRECT_URL`: Base of reset links (default: http://localhost:5173/reset-password)
/// - `MAIL_API_URL` / `MAIL_API_KEY`: HTTP mail relay; mail is only logged when unset
/// - `MAIL_FROM`: Sender address
///
/// # Example
///
/// ```no_run
/// use projectcamp_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::{anyhow, bail};
use chrono::Duration;
use projectcamp_shared::auth::flow::LinkConfig;
use projectcamp_shared::auth::jwt::{TokenService, TokenSettings};
use projectcamp_shared::db::pool;
use std::env;

/// Shortest accepted token secret
const MIN_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub tokens: TokenConfig,
    pub links: LinksConfig,
    pub mail: MailConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode turns on HSTS
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token secrets and lifetimes
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub access_expiry: Duration,
    pub refresh_secret: String,
    pub refresh_expiry: Duration,
}

/// Bases for links sent by email
#[derive(Debug, Clone)]
pub struct LinksConfig {
    pub public_base_url: String,
    pub forgot_password_redirect_url: String,
}

/// Outbound mail
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    /// - The token secrets are too short or identical
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api = ApiConfig {
            host: var_or("API_HOST", "0.0.0.0"),
            port: var_or("API_PORT", "8000").parse::<u16>()?,
            cors_origins: parse_origins(&var_or("CORS_ORIGIN", "http://localhost:5173")),
            production: parse_bool(&var_or("PRODUCTION", "false")),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| anyhow!("DATABASE_URL environment variable is required"))?,
            max_connections: var_or("DATABASE_MAX_CONNECTIONS", "10").parse::<u32>()?,
        };

        let tokens = TokenConfig {
            access_secret: env::var("ACCESS_TOKEN_SECRET")
                .map_err(|_| anyhow!("ACCESS_TOKEN_SECRET environment variable is required"))?,
            access_expiry: parse_duration(&var_or("ACCESS_TOKEN_EXPIRY", "1d"))?,
            refresh_secret: env::var("REFRESH_TOKEN_SECRET")
                .map_err(|_| anyhow!("REFRESH_TOKEN_SECRET environment variable is required"))?,
            refresh_expiry: parse_duration(&var_or("REFRESH_TOKEN_EXPIRY", "10d"))?,
        };
        tokens.validate()?;

        let links = LinksConfig {
            public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:8000"),
            forgot_password_redirect_url: var_or(
                "FORGOT_PASSWORD_REDIRECT_URL",
                "http://localhost:5173/reset-password",
            ),
        };

        let mail = MailConfig {
            api_url: env::var("MAIL_API_URL").ok().filter(|v| !v.is_empty()),
            api_key: env::var("MAIL_API_KEY").ok().filter(|v| !v.is_empty()),
            from: var_or("MAIL_FROM", "mail.taskmanager@projectmanagementapp.com"),
        };

        Ok(Self {
            api,
            database,
            tokens,
            links,
            mail,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn token_service(&self) -> TokenService {
        TokenService::new(
            TokenSettings::new(self.tokens.access_secret.clone(), self.tokens.access_expiry),
            TokenSettings::new(self.tokens.refresh_secret.clone(), self.tokens.refresh_expiry),
        )
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            verify_email_base: format!(
                "{}/api/v1/auth/verify-email",
                self.links.public_base_url.trim_end_matches('/')
            ),
            reset_password_base: self.links.forgot_password_redirect_url.clone(),
        }
    }
}

impl DatabaseConfig {
    /// Pool settings with the remaining knobs at their defaults
    pub fn pool_config(&self) -> pool::DatabaseConfig {
        pool::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            ..Default::default()
        }
    }
}

impl TokenConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.access_secret.len() < MIN_SECRET_LEN {
            bail!("ACCESS_TOKEN_SECRET must be at least {} characters long", MIN_SECRET_LEN);
        }
        if self.refresh_secret.len() < MIN_SECRET_LEN {
            bail!("REFRESH_TOKEN_SECRET must be at least {} characters long", MIN_SECRET_LEN);
        }
        if self.access_secret == self.refresh_secret {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }
        if self.access_expiry <= Duration::zero() || self.refresh_expiry <= Duration::zero() {
            bail!("Token expiry must be positive");
        }
        Ok(())
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

/// Parses `<n>{s,m,h,d}` durations such as `15m` or `10d`
pub fn parse_duration(value: &str) -> anyhow::Result<Duration> {
    let value = value.trim();
    if value.len() < 2 {
        bail!("Invalid duration '{}': expected format like 10d, 12h, 30m, 45s", value);
    }

    let unit_start = value.char_indices().last().map_or(0, |(i, _)| i);
    let (number, unit) = value.split_at(unit_start);
    let quantity: i64 = number
        .parse()
        .map_err(|err| anyhow!("Invalid duration '{}': {}", value, err))?;

    if quantity <= 0 {
        bail!("Invalid duration '{}': must be positive", value);
    }

    let duration = match unit {
        "d" | "D" => Duration::try_days(quantity),
        "h" | "H" => Duration::try_hours(quantity),
        "m" | "M" => Duration::try_minutes(quantity),
        "s" | "S" => Duration::try_seconds(quantity),
        _ => bail!(
            "Invalid duration unit '{}': expected one of d (days), h (hours), m (minutes), s (seconds)",
            unit
        ),
    };

    duration.ok_or_else(|| anyhow!("Invalid duration '{}': out of range", value))
}
