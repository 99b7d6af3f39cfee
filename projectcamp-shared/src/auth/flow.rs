/// Account lifecycle
///
/// [`AuthFlow`] drives every credential operation against a store, the token
/// service and a mailer. The account state lives entirely in user record fields:
///
/// ```text
/// register ──► unverified ──verify_email──► verified
///                  │  ▲
///                  └──┘ resend_verification
///
/// login ──► refresh token stored ──refresh──► rotated ──logout──► cleared
///
/// forgot_password ──► reset token stored ──reset_password──► password replaced
/// ```
///
/// Verification is soft: an unverified account can log in and use the API.
///
/// Operations that only rotate tokens or flip flags write with
/// [`SaveMode::SkipValidation`]; password changes write with
/// [`SaveMode::Validated`].

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::jwt::{TokenPair, TokenService};
use super::temporary_token::{hash_token, TemporaryToken};
use crate::clock::{Clock, SystemClock};
use crate::error::{ServiceError, ServiceResult};
use crate::mail::{password_reset_email, verification_email, MailMessage, Mailer};
use crate::models::user::{NewUser, PublicUser, SaveMode, User, UserUpdate};
use crate::store::DynStore;

const INVALID_TEMPORARY_TOKEN: &str = "Token is invalid or expired";
const UNKNOWN_USER: &str = "User does not exist";

/// Where emailed links point
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Verification links are `{verify_email_base}/{token}`
    pub verify_email_base: String,

    /// Reset links are `{reset_password_base}?token={token}`
    pub reset_password_base: String,
}

impl LinkConfig {
    pub fn verify_email_url(&self, token: &str) -> String {
        format!("{}/{}", self.verify_email_base.trim_end_matches('/'), token)
    }

    pub fn reset_password_url(&self, token: &str) -> String {
        format!("{}?token={}", self.reset_password_base, token)
    }
}

/// Registration input; shape checks happen before this point
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Login input: a password plus either identifier
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

/// Orchestrates registration, sessions, verification and password recovery
pub struct AuthFlow {
    store: DynStore,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    links: LinkConfig,
    clock: Arc<dyn Clock>,
}

impl AuthFlow {
    pub fn new(
        store: DynStore,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        links: LinkConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            mailer,
            links,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source used for temporary-token expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Creates an unverified account and mails a verification link
    ///
    /// # Errors
    ///
    /// - `Conflict` if the username or email is taken
    /// - `Internal` if the new record cannot be read back
    pub async fn register(&self, input: Registration) -> ServiceResult<PublicUser> {
        let existing = self
            .store
            .find_user_by_username_or_email(Some(&input.username), Some(&input.email))
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        let new_user = NewUser::new(
            &input.username,
            &input.email,
            input.full_name,
            &input.password,
        )?;
        let created = self.store.create_user(new_user).await?;

        let token = self.tokens.issue_temporary_token(self.clock.now());
        self.store_verification_token(created.id, &token).await?;
        self.deliver(verification_email(
            &created.email,
            &created.username,
            &self.links.verify_email_url(&token.unhashed),
        ))
        .await;

        let user = self
            .store
            .find_user_by_id(created.id)
            .await?
            .ok_or_else(|| {
                ServiceError::Internal("Something went wrong while registering the user".into())
            })?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user.to_public())
    }

    /// Checks credentials and opens a refresh session
    ///
    /// # Errors
    ///
    /// - `BadRequest` if neither identifier or no password is given
    /// - `NotFound` if no account matches
    /// - `Unauthorized` if the password is wrong
    pub async fn login(&self, input: LoginRequest) -> ServiceResult<LoginOutcome> {
        let username = input.username.as_deref().filter(|v| !v.trim().is_empty());
        let email = input.email.as_deref().filter(|v| !v.trim().is_empty());

        if username.is_none() && email.is_none() {
            return Err(ServiceError::BadRequest(
                "Username or email is required".to_string(),
            ));
        }
        if input.password.is_empty() {
            return Err(ServiceError::BadRequest("Password is required".to_string()));
        }

        let user = self
            .store
            .find_user_by_username_or_email(username, email)
            .await?
            .ok_or_else(|| ServiceError::NotFound(UNKNOWN_USER.to_string()))?;

        if !user.check_password(&input.password)? {
            debug!(user_id = %user.id, "Login rejected: wrong password");
            return Err(ServiceError::Unauthorized("Invalid user credentials".to_string()));
        }

        let (user, tokens) = self.open_session(&user).await?;

        info!(user_id = %user.id, "User logged in");
        Ok(LoginOutcome {
            user: user.to_public(),
            tokens,
        })
    }

    /// Clears the stored refresh token; outstanding access tokens stay valid
    pub async fn logout(&self, user_id: Uuid) -> ServiceResult<()> {
        let update = UserUpdate::refresh_token(None);
        self.save(user_id, update, SaveMode::SkipValidation).await?;

        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Exchanges the current refresh token for a new pair
    ///
    /// The presented token must equal the stored one, so a token that was
    /// already rotated out is rejected.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a missing, invalid, expired or superseded token.
    pub async fn refresh(&self, presented: Option<&str>) -> ServiceResult<TokenPair> {
        let presented = presented
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("Unauthorized request".to_string()))?;

        let claims = self.tokens.verify_refresh_token(presented).map_err(|e| {
            debug!(error = %e, "Refresh token rejected");
            ServiceError::Unauthorized("Invalid refresh token".to_string())
        })?;

        let user = self
            .store
            .find_user_by_id(claims.sub)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid refresh token".to_string()))?;

        if user.refresh_token.as_deref() != Some(presented) {
            warn!(user_id = %user.id, "Superseded refresh token presented");
            return Err(ServiceError::Unauthorized(
                "Refresh token is expired or used".to_string(),
            ));
        }

        let (user, tokens) = self.open_session(&user).await?;

        debug!(user_id = %user.id, "Refresh token rotated");
        Ok(tokens)
    }

    /// Consumes an email-verification token
    ///
    /// # Errors
    ///
    /// - `BadRequest` if the token is empty
    /// - `InvalidToken` if it is unknown, expired or already used
    pub async fn verify_email(&self, unhashed: &str) -> ServiceResult<PublicUser> {
        if unhashed.trim().is_empty() {
            return Err(ServiceError::BadRequest(
                "Email verification token is missing".to_string(),
            ));
        }

        // Decode first, then look up and apply
        let digest = hash_token(unhashed.trim());

        let user = self
            .store
            .find_user_by_verification_token(&digest, self.clock.now())
            .await?
            .ok_or_else(|| ServiceError::InvalidToken(INVALID_TEMPORARY_TOKEN.to_string()))?;

        let update = UserUpdate::verified();
        let user = self.save(user.id, update, SaveMode::SkipValidation).await?;

        info!(user_id = %user.id, "Email verified");
        Ok(user.to_public())
    }

    /// Issues a fresh verification token, replacing any pending one
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user is gone
    /// - `BadRequest` if the email is already verified
    pub async fn resend_verification(&self, user_id: Uuid) -> ServiceResult<()> {
        let user = self.load(user_id).await?;

        if user.is_email_verified {
            return Err(ServiceError::BadRequest("Email is already verified".to_string()));
        }

        let token = self.tokens.issue_temporary_token(self.clock.now());
        self.store_verification_token(user.id, &token).await?;
        self.deliver(verification_email(
            &user.email,
            &user.username,
            &self.links.verify_email_url(&token.unhashed),
        ))
        .await;

        info!(user_id = %user.id, "Verification email re-sent");
        Ok(())
    }

    /// Issues a password-reset token and mails the reset link
    ///
    /// # Errors
    ///
    /// `NotFound` if no account has this email.
    pub async fn forgot_password(&self, email: &str) -> ServiceResult<()> {
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound(UNKNOWN_USER.to_string()))?;

        let token = self.tokens.issue_temporary_token(self.clock.now());
        let update = UserUpdate::reset_slot(Some(token.hashed.clone()));
        self.save(user.id, update, SaveMode::SkipValidation).await?;

        self.deliver(password_reset_email(
            &user.email,
            &user.username,
            &self.links.reset_password_url(&token.unhashed),
        ))
        .await;

        info!(user_id = %user.id, "Password reset requested");
        Ok(())
    }

    /// Consumes a reset token and replaces the password
    ///
    /// # Errors
    ///
    /// `InvalidToken` if the token is unknown, expired or already used.
    pub async fn reset_password(&self, unhashed: &str, new_password: &str) -> ServiceResult<()> {
        let digest = hash_token(unhashed.trim());

        let user = self
            .store
            .find_user_by_reset_token(&digest, self.clock.now())
            .await?
            .ok_or_else(|| ServiceError::InvalidToken(INVALID_TEMPORARY_TOKEN.to_string()))?;

        let update = UserUpdate::reset_slot(None).with_password(new_password)?;
        self.save(user.id, update, SaveMode::Validated).await?;

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// Replaces the password after checking the current one
    ///
    /// # Errors
    ///
    /// `BadRequest` if `old_password` does not match.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let user = self.load(user_id).await?;

        if !user.check_password(old_password)? {
            return Err(ServiceError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        let update = UserUpdate::default().with_password(new_password)?;
        self.save(user.id, update, SaveMode::Validated).await?;

        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Public view of the user
    pub async fn current_user(&self, user_id: Uuid) -> ServiceResult<PublicUser> {
        Ok(self.load(user_id).await?.to_public())
    }

    async fn load(&self, user_id: Uuid) -> ServiceResult<User> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(UNKNOWN_USER.to_string()))
    }

    async fn save(&self, user_id: Uuid, update: UserUpdate, mode: SaveMode) -> ServiceResult<User> {
        self.store
            .update_user(user_id, update, mode)
            .await?
            .ok_or_else(|| ServiceError::NotFound(UNKNOWN_USER.to_string()))
    }

    /// Issues a token pair and stores its refresh half, replacing any prior one
    async fn open_session(&self, user: &User) -> ServiceResult<(User, TokenPair)> {
        let tokens = self
            .tokens
            .issue_pair(user.id, &user.email, &user.username)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let update = UserUpdate::refresh_token(Some(tokens.refresh_token.clone()));
        let user = self.save(user.id, update, SaveMode::SkipValidation).await?;

        Ok((user, tokens))
    }

    async fn store_verification_token(
        &self,
        user_id: Uuid,
        token: &TemporaryToken,
    ) -> ServiceResult<User> {
        let update = UserUpdate::verification_slot(Some(token.hashed.clone()));
        self.save(user_id, update, SaveMode::SkipValidation).await
    }

    async fn deliver(&self, message: MailMessage) {
        if let Err(e) = self.mailer.send(&message).await {
            warn!(to = %message.to, subject = %message.subject, error = %e, "Failed to send mail");
        }
    }
}
