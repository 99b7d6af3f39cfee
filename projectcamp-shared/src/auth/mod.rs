/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: Access and refresh token issuing and validation
/// - [`temporary_token`]: One-time email-verification and password-reset tokens
/// - [`middleware`]: Request authentication (bearer header or `accessToken` cookie)
/// - [`authorization`]: Project role checks
/// - [`flow`]: The account lifecycle: register, login, refresh, verify, reset
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id, salted, fixed cost parameters
/// - **JWT Tokens**: HS256 with separate access and refresh secrets
/// - **Refresh Sessions**: One persisted refresh token per user, rotated on use
/// - **Temporary Tokens**: Only SHA-256 digests are stored, valid for 20 minutes
///
/// # Example
///
/// ```
/// use projectcamp_shared::auth::password::{hash_password, verify_password};
/// use projectcamp_shared::auth::temporary_token::{hash_token, TemporaryToken};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let token = TemporaryToken::generate(chrono::Utc::now());
/// assert_eq!(hash_token(&token.unhashed), token.hashed.hash);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod flow;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod temporary_token;
