/// Authentication endpoints
///
/// Account lifecycle over HTTP. Handlers validate the body shape, call
/// [`AuthFlow`](projectcamp_shared::auth::flow::AuthFlow) and wrap the result
/// in the success envelope. Login and refresh also set the token cookies.
///
/// # Endpoints
///
/// - `POST /api/v1/auth/register` - Register and send a verification email
/// - `POST /api/v1/auth/login` - Login and get tokens
/// - `POST /api/v1/auth/logout` - Clear the session (authenticated)
/// - `POST /api/v1/auth/refresh-token` - Rotate the token pair
/// - `GET  /api/v1/auth/verify-email/:token` - Consume a verification token
/// - `POST /api/v1/auth/resend-email-verification` - Reissue it (authenticated)
/// - `POST /api/v1/auth/forgot-password` - Email a reset link
/// - `POST /api/v1/auth/reset-password/:token` - Consume a reset token
/// - `POST /api/v1/auth/change-password` - Change password (authenticated)
/// - `POST /api/v1/auth/current-user` - Caller profile (authenticated)

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{lowercase, ValidatedJson},
    response::ApiResponse,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use projectcamp_shared::{
    auth::{
        flow::{LoginRequest as Credentials, Registration},
        jwt::TokenPair,
        middleware::{AuthContext, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
    },
    models::user::PublicUser,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        email(message = "Email is invalid"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub email: String,

    #[validate(
        length(min = 3, max = 15, message = "Username must be 3 to 15 characters long"),
        custom(function = "lowercase")
    )]
    pub username: String,

    #[validate(length(min = 4, message = "Password must be at least 4 characters long"))]
    pub password: String,

    #[validate(length(max = 100, message = "Full name must be at most 100 characters"))]
    pub full_name: Option<String>,
}

/// Login request: a password plus username or email
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,

    pub username: Option<String>,

    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login payload
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Refresh request; the cookie takes precedence over the body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 4, message = "Password must be at least 4 characters long"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Old password is required"))]
    pub old_password: String,

    #[validate(length(min = 4, message = "Password must be at least 4 characters long"))]
    pub new_password: String,
}

/// `HttpOnly; Secure; Path=/` cookie
fn token_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .build()
}

/// Same cookie, already expired
fn expired_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = token_cookie(name, String::new());
    cookie.make_removal();
    cookie
}

fn with_token_cookies(jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    jar.add(token_cookie(ACCESS_TOKEN_COOKIE, tokens.access_token.clone()))
        .add(token_cookie(REFRESH_TOKEN_COOKIE, tokens.refresh_token.clone()))
}

/// Register a new user
///
/// ```text
/// POST /api/v1/auth/register
/// { "email": "a@x.com", "username": "alice", "password": "pw123", "fullName": "Alice" }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Username or email already taken
/// - `422 Unprocessable Entity`: Body failed validation
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = state
        .auth
        .register(Registration {
            username: req.username,
            email: req.email,
            password: req.password,
            full_name: req.full_name,
        })
        .await?;

    Ok(ApiResponse::created(
        user,
        "User registered successfully. A verification email has been sent",
    ))
}

/// Login with username or email
///
/// Sets the `accessToken` and `refreshToken` cookies and returns both tokens
/// in the body for clients that cannot use cookies.
///
/// # Errors
///
/// - `400 Bad Request`: Neither identifier given
/// - `401 Unauthorized`: Wrong password
/// - `404 Not Found`: No such user
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<LoginResponse>)> {
    let outcome = state
        .auth
        .login(Credentials {
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;

    let jar = with_token_cookies(jar, &outcome.tokens);
    let body = LoginResponse {
        user: outcome.user,
        tokens: outcome.tokens,
    };

    Ok((jar, ApiResponse::ok(body, "User logged in successfully")))
}

/// Clears the stored refresh token and both cookies
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<Value>)> {
    state.auth.logout(auth.user_id()).await?;

    let jar = jar
        .add(expired_cookie(ACCESS_TOKEN_COOKIE))
        .add(expired_cookie(REFRESH_TOKEN_COOKIE));

    Ok((jar, ApiResponse::ok(json!({}), "User logged out")))
}

/// Rotates the token pair
///
/// Reads the refresh token from the `refreshToken` cookie, falling back to the
/// `refreshToken` body field.
///
/// # Errors
///
/// - `401 Unauthorized`: Missing, invalid, expired or already rotated token
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> ApiResult<(CookieJar, ApiResponse<TokenPair>)> {
    let presented = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| body.and_then(|Json(req)| req.refresh_token));

    let tokens = state.auth.refresh(presented.as_deref()).await?;
    let jar = with_token_cookies(jar, &tokens);

    Ok((jar, ApiResponse::ok(tokens, "Access token refreshed")))
}

/// Consumes an email verification token
///
/// # Errors
///
/// - `400 Bad Request`: Token unknown, used or older than 20 minutes
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<ApiResponse<Value>> {
    let user = state.auth.verify_email(&token).await?;

    info!(user_id = %user.id, "Email verified over HTTP");
    Ok(ApiResponse::ok(
        json!({ "isEmailVerified": user.is_email_verified }),
        "Email is verified",
    ))
}

/// Sends a fresh verification email
///
/// # Errors
///
/// - `400 Bad Request`: Email already verified
pub async fn resend_email_verification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Value>> {
    state.auth.resend_verification(auth.user_id()).await?;

    Ok(ApiResponse::ok(json!({}), "Mail has been sent to your mail ID"))
}

/// Emails a password reset link
///
/// # Errors
///
/// - `404 Not Found`: No account with that email
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> ApiResult<ApiResponse<Value>> {
    state.auth.forgot_password(&req.email).await?;

    Ok(ApiResponse::ok(json!({}), "Password reset mail has been sent"))
}

/// Sets a new password using a reset token
///
/// # Errors
///
/// - `400 Bad Request`: Token unknown, used or expired
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> ApiResult<ApiResponse<Value>> {
    state.auth.reset_password(&token, &req.new_password).await?;

    Ok(ApiResponse::ok(json!({}), "Password reset successfully"))
}

/// Changes the caller's password
///
/// # Errors
///
/// - `400 Bad Request`: Old password does not match
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<ApiResponse<Value>> {
    state
        .auth
        .change_password(auth.user_id(), &req.old_password, &req.new_password)
        .await?;

    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

/// Returns the caller's public profile
pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = state.auth.current_user(auth.user_id()).await?;

    Ok(ApiResponse::ok(user, "Current user fetched successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rules() {
        let valid = RegisterRequest {
            email: "a@x.com".into(),
            username: "alice".into(),
            password: "pw123".into(),
            full_name: None,
        };
        assert!(valid.validate().is_ok());

        let invalid = RegisterRequest {
            email: "not-an-email".into(),
            username: "Alice".into(),
            password: "pw".into(),
            full_name: None,
        };
        let errors = invalid.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_register_email_fits_column() {
        let domain = format!("{}com", format!("{}.", "b".repeat(63)).repeat(3));
        let req = RegisterRequest {
            email: format!("{}@{}", "a".repeat(64), domain),
            username: "alice".into(),
            password: "pw123".into(),
            full_name: None,
        };
        assert!(req.email.len() > 255);

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        let email_errors = fields["email"];
        assert_eq!(email_errors.len(), 1);
        assert_eq!(email_errors[0].code, "length");
    }

    #[test]
    fn test_login_requires_password() {
        let req = LoginRequest {
            email: None,
            username: Some("alice".into()),
            password: String::new(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = token_cookie(ACCESS_TOKEN_COOKIE, "abc".into());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));

        let expired = expired_cookie(REFRESH_TOKEN_COOKIE);
        assert_eq!(expired.value(), "");
        assert!(expired.max_age().is_some_and(|age| age.is_zero()));
    }

    #[test]
    fn test_login_payload_shape() {
        let tokens = TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        };
        let json = serde_json::to_value(&tokens).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
    }
}
