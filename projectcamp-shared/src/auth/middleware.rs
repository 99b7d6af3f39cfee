/// Request authentication
///
/// Resolves the caller of a request from an access token. The token is read from
/// the `Authorization: Bearer <token>` header, or failing that from the
/// `accessToken` cookie. The token must verify and its subject must still exist.
///
/// The HTTP layer wraps [`authenticate`] in an axum middleware and inserts the
/// resulting [`AuthContext`] into request extensions.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use projectcamp_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {}!", auth.user.username)
/// }
/// ```

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use super::jwt::{JwtError, TokenService};
use crate::models::user::PublicUser;
use crate::store::{StoreError, UserStore};

/// Cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Cookie carrying the refresh token
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Authenticated caller, added to request extensions
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Caller without credential fields
    pub user: PublicUser,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer header and no access-token cookie
    #[error("Unauthorized request")]
    MissingCredentials,

    /// Signature, expiry or type check failed
    #[error("Invalid access token")]
    InvalidToken(#[source] JwtError),

    /// The token's subject no longer exists
    #[error("Invalid access token")]
    UnknownUser,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Reads the access token from the bearer header or the cookie
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Authenticates a request from its headers
///
/// # Errors
///
/// - `MissingCredentials` if no token is present
/// - `InvalidToken` if the token does not verify as an access token
/// - `UnknownUser` if the subject was deleted
pub async fn authenticate<S>(
    store: &S,
    tokens: &TokenService,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError>
where
    S: UserStore + ?Sized,
{
    let token = extract_access_token(headers).ok_or(AuthError::MissingCredentials)?;

    let claims = tokens
        .verify_access_token(&token)
        .map_err(AuthError::InvalidToken)?;

    let user = store
        .find_user_by_id(claims.sub)
        .await?
        .ok_or(AuthError::UnknownUser)?;

    Ok(AuthContext {
        user: user.to_public(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenSettings;
    use crate::models::user::NewUser;
    use crate::store::memory::MemoryStore;
    use axum::http::HeaderValue;
    use chrono::Duration;

    fn tokens() -> TokenService {
        TokenService::new(
            TokenSettings::new("test-access-secret-at-least-32-bytes", Duration::minutes(15)),
            TokenSettings::new("test-refresh-secret-at-least-32-bytes", Duration::days(10)),
        )
    }

    #[test]
    fn test_extract_prefers_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=cookie-token"));

        assert_eq!(extract_access_token(&headers).as_deref(), Some("header-token"));
    }

    #[test]
    fn test_extract_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=cookie-token"),
        );

        assert_eq!(extract_access_token(&headers).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn test_extract_nothing() {
        assert!(extract_access_token(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_access_token(&headers).is_none());
    }

    #[tokio::test]
    async fn test_authenticate() {
        let store = MemoryStore::new();
        let tokens = tokens();
        let user = store
            .create_user(NewUser::new("alice", "a@x.com", None, "pw123").unwrap())
            .await
            .unwrap();

        let token = tokens.issue_access_token(user.id, &user.email, &user.username).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        let ctx = authenticate(&store, &tokens, &headers).await.unwrap();
        assert_eq!(ctx.user_id(), user.id);
        assert_eq!(ctx.user.username, "alice");
    }

    #[tokio::test]
    async fn test_authenticate_failures() {
        let store = MemoryStore::new();
        let tokens = tokens();

        let missing = authenticate(&store, &tokens, &HeaderMap::new()).await;
        assert!(matches!(missing, Err(AuthError::MissingCredentials)));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));
        let invalid = authenticate(&store, &tokens, &headers).await;
        assert!(matches!(invalid, Err(AuthError::InvalidToken(_))));

        // A refresh token is not an access token
        let refresh = tokens.issue_refresh_token(Uuid::new_v4()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", refresh)).unwrap(),
        );
        let wrong_type = authenticate(&store, &tokens, &headers).await;
        assert!(matches!(wrong_type, Err(AuthError::InvalidToken(_))));

        let ghost = tokens.issue_access_token(Uuid::new_v4(), "g@x.com", "ghost").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", ghost)).unwrap(),
        );
        let unknown = authenticate(&store, &tokens, &headers).await;
        assert!(matches!(unknown, Err(AuthError::UnknownUser)));
    }
}
