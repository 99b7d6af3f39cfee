/// User model and database operations
///
/// A user record holds the credentials and the token slots driving the account
/// lifecycle: the single active refresh token, the email-verification token and
/// the forgot-password token. Temporary tokens are stored as SHA-256 digests with
/// an expiry; lookups by digest only match while `expiry > now`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     username VARCHAR(15) NOT NULL UNIQUE,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     full_name VARCHAR(100),
///     password_hash TEXT NOT NULL,
///     is_email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     avatar_url TEXT NOT NULL DEFAULT 'https://placehold.co/200x200',
///     avatar_local_path TEXT NOT NULL DEFAULT '',
///     refresh_token TEXT,
///     forgot_password_token VARCHAR(64),
///     forgot_password_expiry TIMESTAMPTZ,
///     email_verification_token VARCHAR(64),
///     email_verification_expiry TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use projectcamp_shared::models::user::{NewUser, User};
/// use projectcamp_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = NewUser::new("alice", "a@x.com", None, "pw123")?;
/// let user = User::create(&pool, new_user).await?;
///
/// let found = User::find_by_email(&pool, "a@x.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::{hash_password, is_password_hash, verify_password, PasswordError};
use crate::auth::temporary_token::HashedToken;
use crate::error::FieldError;

/// Avatar shown until the user uploads one
pub const DEFAULT_AVATAR_URL: &str = "https://placehold.co/200x200";

/// Longest accepted full name
pub const FULL_NAME_MAX_LEN: usize = 100;

pub(crate) const USER_COLUMNS: &str = "id, username, email, full_name, password_hash, \
     is_email_verified, avatar_url, avatar_local_path, refresh_token, \
     forgot_password_token, forgot_password_expiry, \
     email_verification_token, email_verification_expiry, created_at, updated_at";

/// Full user record, including credential material
///
/// Deliberately not `Serialize`: use [`User::to_public`] for anything that leaves
/// the process.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Lowercase, trimmed, unique
    pub username: String,

    /// Lowercase, trimmed, unique
    pub email: String,

    pub full_name: Option<String>,

    /// Argon2id PHC string
    pub password_hash: String,

    pub is_email_verified: bool,

    pub avatar_url: String,

    pub avatar_local_path: String,

    /// The single active refresh token; `None` means no refresh session
    pub refresh_token: Option<String>,

    pub forgot_password_token: Option<String>,

    pub forgot_password_expiry: Option<DateTime<Utc>>,

    pub email_verification_token: Option<String>,

    pub email_verification_expiry: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Avatar image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avatar {
    pub url: String,
    pub local_path: String,
}

impl Default for Avatar {
    fn default() -> Self {
        Self {
            url: DEFAULT_AVATAR_URL.to_string(),
            local_path: String::new(),
        }
    }
}

/// User view safe to return to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar: Avatar,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reduced user view embedded in member and task listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar: Avatar,
    pub email: String,
}

impl User {
    pub fn avatar(&self) -> Avatar {
        Avatar {
            url: self.avatar_url.clone(),
            local_path: self.avatar_local_path.clone(),
        }
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar(),
            is_email_verified: self.is_email_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn to_summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar(),
            email: self.email.clone(),
        }
    }

    /// Checks a plaintext password against the stored hash
    pub fn check_password(&self, password: &str) -> Result<bool, PasswordError> {
        verify_password(password, &self.password_hash)
    }

    /// Verification token slot, if one is set
    pub fn email_verification(&self) -> Option<HashedToken> {
        match (&self.email_verification_token, self.email_verification_expiry) {
            (Some(hash), Some(expires_at)) => Some(HashedToken {
                hash: hash.clone(),
                expires_at,
            }),
            _ => None,
        }
    }

    /// Forgot-password token slot, if one is set
    pub fn password_reset(&self) -> Option<HashedToken> {
        match (&self.forgot_password_token, self.forgot_password_expiry) {
            (Some(hash), Some(expires_at)) => Some(HashedToken {
                hash: hash.clone(),
                expires_at,
            }),
            _ => None,
        }
    }
}

/// Trims and lowercases a username or email
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Input for creating a new user
///
/// The password is hashed on construction; there is no way to build a
/// `NewUser` holding plaintext.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    password_hash: String,
}

impl NewUser {
    pub fn new(
        username: &str,
        email: &str,
        full_name: Option<String>,
        password: &str,
    ) -> Result<Self, PasswordError> {
        Ok(Self {
            username: normalize_identifier(username),
            email: normalize_identifier(email),
            full_name: full_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            password_hash: hash_password(password)?,
        })
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

/// How much checking `update_user` performs before writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Run the field checks in [`UserUpdate::validate`]
    Validated,

    /// Write as-is; for token rotation and flag flips
    SkipValidation,
}

/// Partial update of a user record
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<Option<String>>,

    pub is_email_verified: Option<bool>,

    pub refresh_token: Option<Option<String>>,

    pub email_verification: Option<Option<HashedToken>>,

    pub password_reset: Option<Option<HashedToken>>,

    /// Set only through [`UserUpdate::set_password`] outside this crate
    pub(crate) password_hash: Option<String>,
}

impl UserUpdate {
    /// Stores (or with `None`, clears) the active refresh token
    pub fn refresh_token(token: Option<String>) -> Self {
        Self {
            refresh_token: Some(token),
            ..Default::default()
        }
    }

    /// Marks the email verified and consumes the verification token
    pub fn verified() -> Self {
        Self {
            is_email_verified: Some(true),
            email_verification: Some(None),
            ..Default::default()
        }
    }

    pub fn verification_slot(slot: Option<HashedToken>) -> Self {
        Self {
            email_verification: Some(slot),
            ..Default::default()
        }
    }

    pub fn reset_slot(slot: Option<HashedToken>) -> Self {
        Self {
            password_reset: Some(slot),
            ..Default::default()
        }
    }

    pub fn and_refresh_token(mut self, token: Option<String>) -> Self {
        self.refresh_token = Some(token);
        self
    }

    /// Replaces the password; the plaintext is hashed immediately
    pub fn set_password(&mut self, password: &str) -> Result<(), PasswordError> {
        self.password_hash = Some(hash_password(password)?);
        Ok(())
    }

    pub fn with_password(mut self, password: &str) -> Result<Self, PasswordError> {
        self.set_password(password)?;
        Ok(self)
    }

    pub fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.is_email_verified.is_none()
            && self.refresh_token.is_none()
            && self.email_verification.is_none()
            && self.password_reset.is_none()
            && self.password_hash.is_none()
    }

    /// Field rules applied under [`SaveMode::Validated`]
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if let Some(Some(name)) = &self.full_name {
            if name.chars().count() > FULL_NAME_MAX_LEN {
                errors.push(FieldError::new(
                    "fullName",
                    format!("Full name must be at most {} characters", FULL_NAME_MAX_LEN),
                ));
            }
        }

        if let Some(hash) = &self.password_hash {
            if !is_password_hash(hash) {
                errors.push(FieldError::new("password", "Password must be stored hashed"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Applies the update to an in-memory record
    pub fn apply_to(self, user: &mut User, now: DateTime<Utc>) {
        if let Some(full_name) = self.full_name {
            user.full_name = full_name;
        }
        if let Some(verified) = self.is_email_verified {
            user.is_email_verified = verified;
        }
        if let Some(refresh_token) = self.refresh_token {
            user.refresh_token = refresh_token;
        }
        if let Some(slot) = self.email_verification {
            user.email_verification_expiry = slot.as_ref().map(|t| t.expires_at);
            user.email_verification_token = slot.map(|t| t.hash);
        }
        if let Some(slot) = self.password_reset {
            user.forgot_password_expiry = slot.as_ref().map(|t| t.expires_at);
            user.forgot_password_token = slot.map(|t| t.hash);
        }
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = now;
    }
}

impl User {
    /// Inserts a new user with default avatar and unverified email
    ///
    /// # Errors
    ///
    /// Unique violations on `username` or `email` surface as `sqlx::Error::Database`.
    pub async fn create(pool: &PgPool, data: NewUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (id, username, email, full_name, password_hash, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(data.username)
            .bind(data.email)
            .bind(data.full_name)
            .bind(data.password_hash)
            .bind(DEFAULT_AVATAR_URL)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_identifier(email))
            .fetch_optional(pool)
            .await
    }

    /// Finds the user matching either identifier
    ///
    /// A `None` identifier never matches.
    pub async fn find_by_username_or_email(
        pool: &PgPool,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM users
            WHERE ($1::TEXT IS NOT NULL AND username = $1)
               OR ($2::TEXT IS NOT NULL AND email = $2)
            ORDER BY created_at
            LIMIT 1
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(username.map(normalize_identifier))
            .bind(email.map(normalize_identifier))
            .fetch_optional(pool)
            .await
    }

    /// Finds the user holding an unexpired email-verification token digest
    pub async fn find_by_verification_token(
        pool: &PgPool,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM users
            WHERE email_verification_token = $1
              AND email_verification_expiry > $2
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Finds the user holding an unexpired forgot-password token digest
    pub async fn find_by_reset_token(
        pool: &PgPool,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM users
            WHERE forgot_password_token = $1
              AND forgot_password_expiry > $2
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Applies a partial update
    ///
    /// Builds the `SET` list from the fields present. Returns `None` if the user
    /// does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UserUpdate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        let mut push = |query: &mut String, column: &str| {
            bind_count += 1;
            query.push_str(&format!(", {} = ${}", column, bind_count));
        };

        if data.full_name.is_some() {
            push(&mut query, "full_name");
        }
        if data.is_email_verified.is_some() {
            push(&mut query, "is_email_verified");
        }
        if data.refresh_token.is_some() {
            push(&mut query, "refresh_token");
        }
        if data.email_verification.is_some() {
            push(&mut query, "email_verification_token");
            push(&mut query, "email_verification_expiry");
        }
        if data.password_reset.is_some() {
            push(&mut query, "forgot_password_token");
            push(&mut query, "forgot_password_expiry");
        }
        if data.password_hash.is_some() {
            push(&mut query, "password_hash");
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {}", USER_COLUMNS));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(full_name) = data.full_name {
            q = q.bind(full_name);
        }
        if let Some(verified) = data.is_email_verified {
            q = q.bind(verified);
        }
        if let Some(refresh_token) = data.refresh_token {
            q = q.bind(refresh_token);
        }
        if let Some(slot) = data.email_verification {
            q = q
                .bind(slot.as_ref().map(|t| t.hash.clone()))
                .bind(slot.map(|t| t.expires_at));
        }
        if let Some(slot) = data.password_reset {
            q = q
                .bind(slot.as_ref().map(|t| t.hash.clone()))
                .bind(slot.map(|t| t.expires_at));
        }
        if let Some(hash) = data.password_hash {
            q = q.bind(hash);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a user; returns whether a row was removed
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "a@x.com".into(),
            full_name: Some("Alice".into()),
            password_hash: hash_password("pw123").unwrap(),
            is_email_verified: false,
            avatar_url: DEFAULT_AVATAR_URL.into(),
            avatar_local_path: String::new(),
            refresh_token: Some("refresh".into()),
            forgot_password_token: None,
            forgot_password_expiry: None,
            email_verification_token: Some("digest".into()),
            email_verification_expiry: Some(now + Duration::minutes(20)),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_new_user_normalizes_and_hashes() {
        let user = NewUser::new("  Alice ", " A@X.com", Some("  ".into()), "pw123").unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.full_name, None);
        assert_ne!(user.password_hash(), "pw123");
        assert!(verify_password("pw123", user.password_hash()).unwrap());
    }

    #[test]
    fn test_public_view_hides_credentials() {
        let user = sample_user();
        let json = serde_json::to_value(user.to_public()).unwrap();

        assert_eq!(json["username"], "alice");
        assert_eq!(json["fullName"], "Alice");
        assert_eq!(json["avatar"]["url"], DEFAULT_AVATAR_URL);
        assert_eq!(json["avatar"]["localPath"], "");
        assert_eq!(json["isEmailVerified"], false);
        for hidden in [
            "passwordHash",
            "password_hash",
            "refreshToken",
            "emailVerificationToken",
            "forgotPasswordToken",
        ] {
            assert!(json.get(hidden).is_none(), "{} leaked", hidden);
        }
    }

    #[test]
    fn test_update_validation() {
        assert!(UserUpdate::default().validate().is_ok());

        let long_name = UserUpdate {
            full_name: Some(Some("x".repeat(FULL_NAME_MAX_LEN + 1))),
            ..Default::default()
        };
        let errors = long_name.validate().unwrap_err();
        assert_eq!(errors[0].field, "fullName");

        let password = UserUpdate::default().with_password("newpw1").unwrap();
        assert!(password.validate().is_ok());
        assert_ne!(password.password_hash(), Some("newpw1"));
    }

    #[test]
    fn test_apply_update_clears_token_slots() {
        let mut user = sample_user();
        let update = UserUpdate {
            is_email_verified: Some(true),
            email_verification: Some(None),
            refresh_token: Some(None),
            ..Default::default()
        };
        let later = user.updated_at + Duration::seconds(5);

        update.apply_to(&mut user, later);

        assert!(user.is_email_verified);
        assert!(user.email_verification().is_none());
        assert!(user.email_verification_expiry.is_none());
        assert!(user.refresh_token.is_none());
        assert_eq!(user.updated_at, later);
    }

    #[test]
    fn test_apply_update_sets_reset_slot() {
        let mut user = sample_user();
        let expires_at = Utc::now() + Duration::minutes(20);
        let update = UserUpdate {
            password_reset: Some(Some(HashedToken {
                hash: "reset-digest".into(),
                expires_at,
            })),
            ..Default::default()
        };

        update.apply_to(&mut user, Utc::now());

        let slot = user.password_reset().unwrap();
        assert_eq!(slot.hash, "reset-digest");
        assert_eq!(slot.expires_at, expires_at);
    }

    #[test]
    fn test_empty_update() {
        assert!(UserUpdate::default().is_empty());
        assert!(!UserUpdate {
            refresh_token: Some(None),
            ..Default::default()
        }
        .is_empty());
    }
}
