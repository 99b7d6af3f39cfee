/// JWT token generation and validation module
///
/// Access tokens are short-lived and stateless: they carry the user's id, email and
/// username and are never persisted. Refresh tokens carry only the user id; the caller
/// stores the issued value on the user record, which keeps a single active refresh
/// session per user.
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256)
/// - **Secrets**: Access and refresh tokens are signed with different secrets
/// - **Validation**: Signature, expiration, not-before, issuer and token type
/// - **Uniqueness**: Every token carries a random `jti`, so two tokens issued in the
///   same second for the same user still differ
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use projectcamp_shared::auth::jwt::{TokenService, TokenSettings};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tokens = TokenService::new(
///     TokenSettings::new("access-secret-at-least-32-bytes-long", Duration::minutes(15)),
///     TokenSettings::new("refresh-secret-at-least-32-bytes-long", Duration::days(10)),
/// );
///
/// let user_id = Uuid::new_v4();
/// let token = tokens.issue_access_token(user_id, "alice@example.com", "alice")?;
/// let claims = tokens.verify_access_token(&token)?;
/// assert_eq!(claims.sub, user_id);
/// assert_eq!(claims.username.as_deref(), Some("alice"));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::temporary_token::TemporaryToken;

/// Issuer claim stamped on every token
pub const ISSUER: &str = "projectcamp";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, format or issuer check failed
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// An access token was presented where a refresh token was expected, or vice versa
    #[error("Expected {expected} token, got {actual} token")]
    WrongTokenType {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Access token (short-lived)
    Access,

    /// Refresh token (long-lived, persisted on the user record)
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims structure
///
/// `email` and `username` are present on access tokens only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Issuer - Always [`ISSUER`]
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Unique token id
    pub jti: Uuid,

    /// Token type
    pub token_type: TokenType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Claims {
    fn issued(user_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4(),
            token_type,
            email: None,
            username: None,
        }
    }

    /// Claims for an access token embedding the user's identity
    pub fn access(user_id: Uuid, email: &str, username: &str, expires_in: Duration) -> Self {
        Self {
            email: Some(email.to_string()),
            username: Some(username.to_string()),
            ..Self::issued(user_id, TokenType::Access, expires_in)
        }
    }

    /// Claims for a refresh token embedding only the user id
    pub fn refresh(user_id: Uuid, expires_in: Duration) -> Self {
        Self::issued(user_id, TokenType::Refresh, expires_in)
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Gets time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a JWT and extracts its claims
///
/// Verifies signature, expiry, not-before and issuer. Expiry is reported as
/// [`JwtError::Expired`]; every other failure is [`JwtError::InvalidToken`].
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::InvalidToken(e.to_string()),
    })?;

    Ok(token_data.claims)
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::WrongTokenType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }

    Ok(claims)
}

/// Secret and lifetime for one kind of token
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub expires_in: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            secret: secret.into(),
            expires_in,
        }
    }
}

/// Freshly issued access and refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies every token the application hands out
#[derive(Debug, Clone)]
pub struct TokenService {
    access: TokenSettings,
    refresh: TokenSettings,
}

impl TokenService {
    pub fn new(access: TokenSettings, refresh: TokenSettings) -> Self {
        Self { access, refresh }
    }

    /// Signed short-lived token embedding id, email and username
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        username: &str,
    ) -> Result<String, JwtError> {
        let claims = Claims::access(user_id, email, username, self.access.expires_in);
        create_token(&claims, &self.access.secret)
    }

    /// Signed long-lived token embedding only the user id
    ///
    /// The caller persists the value on the user record, replacing any prior one.
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, JwtError> {
        let claims = Claims::refresh(user_id, self.refresh.expires_in);
        create_token(&claims, &self.refresh.secret)
    }

    pub fn issue_pair(
        &self,
        user_id: Uuid,
        email: &str,
        username: &str,
    ) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user_id, email, username)?,
            refresh_token: self.issue_refresh_token(user_id)?,
        })
    }

    /// One-time verification/reset secret expiring 20 minutes after `now`
    pub fn issue_temporary_token(&self, now: DateTime<Utc>) -> TemporaryToken {
        TemporaryToken::generate(now)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        validate_typed(token, &self.access.secret, TokenType::Access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        validate_typed(token, &self.refresh.secret, TokenType::Refresh)
    }
}
