/// Integration tests for the account lifecycle
///
/// Runs the auth flow over the in-memory store with a recording mailer and a
/// manual clock, so no database is needed.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use projectcamp_shared::auth::flow::{AuthFlow, LinkConfig, LoginRequest, Registration};
use projectcamp_shared::auth::jwt::{TokenService, TokenSettings};
use projectcamp_shared::auth::temporary_token::TemporaryToken;
use projectcamp_shared::clock::ManualClock;
use projectcamp_shared::error::ServiceError;
use projectcamp_shared::mail::{MailError, MailMessage, Mailer, MemoryMailer};
use projectcamp_shared::models::user::{SaveMode, UserUpdate};
use projectcamp_shared::store::memory::MemoryStore;
use projectcamp_shared::store::{DynStore, UserStore};
use std::sync::Arc;

struct Harness {
    flow: AuthFlow,
    store: Arc<MemoryStore>,
    mailer: MemoryMailer,
    clock: ManualClock,
}

/// Mail transport that is always down
struct UnreachableMailer;

#[async_trait]
impl Mailer for UnreachableMailer {
    async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
        Err(MailError::Transport("connection refused".into()))
    }
}

fn harness() -> Harness {
    harness_with(None)
}

fn harness_with(transport: Option<Arc<dyn Mailer>>) -> Harness {
    let clock = ManualClock::default();
    let store = Arc::new(MemoryStore::with_clock(Arc::new(clock.clone())));
    let mailer = MemoryMailer::new();
    let transport = transport.unwrap_or_else(|| Arc::new(mailer.clone()));

    let tokens = TokenService::new(
        TokenSettings::new("test-access-secret-at-least-32-bytes", Duration::minutes(15)),
        TokenSettings::new("test-refresh-secret-at-least-32-bytes", Duration::days(10)),
    );
    let links = LinkConfig {
        verify_email_base: "http://localhost:8000/api/v1/auth/verify-email".into(),
        reset_password_base: "http://localhost:5173/reset-password".into(),
    };

    let dyn_store: DynStore = store.clone();
    let flow = AuthFlow::new(dyn_store, tokens, transport, links)
        .with_clock(Arc::new(clock.clone()));

    Harness {
        flow,
        store,
        mailer,
        clock,
    }
}

fn alice() -> Registration {
    Registration {
        username: "alice".into(),
        email: "a@x.com".into(),
        password: "pw123".into(),
        full_name: Some("Alice Liddell".into()),
    }
}

fn login_as(username: &str, password: &str) -> LoginRequest {
    LoginRequest {
        username: Some(username.into()),
        email: None,
        password: password.into(),
    }
}

/// Pulls the 40-char token following `marker` out of the last mail to `to`
fn token_from_mail(mailer: &MemoryMailer, to: &str, marker: &str) -> String {
    let message = mailer.last_to(to).expect("no mail sent");
    let start = message.text_body.find(marker).expect("no link in mail") + marker.len();
    message.text_body[start..start + 40].to_string()
}

fn verification_token(mailer: &MemoryMailer) -> String {
    token_from_mail(mailer, "a@x.com", "verify-email/")
}

fn reset_token(mailer: &MemoryMailer) -> String {
    token_from_mail(mailer, "a@x.com", "?token=")
}

#[tokio::test]
async fn test_register_hashes_password_and_login_succeeds() {
    let h = harness();

    let user = h.flow.register(alice()).await.unwrap();
    assert_eq!(user.username, "alice");
    assert!(!user.is_email_verified);

    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert_ne!(stored.password_hash, "pw123");
    assert!(stored.email_verification().is_some());

    let outcome = h.flow.login(login_as("alice", "pw123")).await.unwrap();
    assert_eq!(outcome.user.id, user.id);
}

#[tokio::test]
async fn test_register_sends_verification_mail() {
    let h = harness();
    h.flow.register(alice()).await.unwrap();

    let message = h.mailer.last_to("a@x.com").unwrap();
    assert_eq!(message.subject, "Please verify your email");
    assert!(message
        .text_body
        .contains("http://localhost:8000/api/v1/auth/verify-email/"));
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let h = harness();
    h.flow.register(alice()).await.unwrap();

    let same_username = Registration {
        email: "other@x.com".into(),
        ..alice()
    };
    let same_email = Registration {
        username: "bob".into(),
        email: "A@X.COM".into(),
        ..alice()
    };

    assert!(matches!(
        h.flow.register(same_username).await,
        Err(ServiceError::Conflict(_))
    ));
    assert!(matches!(
        h.flow.register(same_email).await,
        Err(ServiceError::Conflict(_))
    ));
    assert_eq!(h.store.user_count().await, 1);
}

#[tokio::test]
async fn test_verification_token_is_single_use() {
    let h = harness();
    h.flow.register(alice()).await.unwrap();
    let token = verification_token(&h.mailer);

    let verified = h.flow.verify_email(&token).await.unwrap();
    assert!(verified.is_email_verified);

    assert!(matches!(
        h.flow.verify_email(&token).await,
        Err(ServiceError::InvalidToken(_))
    ));
}

#[tokio::test]
async fn test_verification_token_expires() {
    let h = harness();
    h.flow.register(alice()).await.unwrap();
    let token = verification_token(&h.mailer);

    h.clock.advance(Duration::minutes(20) + Duration::seconds(1));

    assert!(matches!(
        h.flow.verify_email(&token).await,
        Err(ServiceError::InvalidToken(_))
    ));
}

#[tokio::test]
async fn test_empty_verification_token_is_bad_request() {
    let h = harness();
    assert!(matches!(
        h.flow.verify_email("  ").await,
        Err(ServiceError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_resend_verification_replaces_token() {
    let h = harness();
    let user = h.flow.register(alice()).await.unwrap();
    let first = verification_token(&h.mailer);

    h.flow.resend_verification(user.id).await.unwrap();
    let second = verification_token(&h.mailer);
    assert_ne!(first, second);

    // Only the newest token is stored
    assert!(matches!(
        h.flow.verify_email(&first).await,
        Err(ServiceError::InvalidToken(_))
    ));
    h.flow.verify_email(&second).await.unwrap();

    assert!(matches!(
        h.flow.resend_verification(user.id).await,
        Err(ServiceError::BadRequest(msg)) if msg == "Email is already verified"
    ));
}

#[tokio::test]
async fn test_login_failures() {
    let h = harness();
    h.flow.register(alice()).await.unwrap();

    assert!(matches!(
        h.flow.login(login_as("alice", "wrong")).await,
        Err(ServiceError::Unauthorized(_))
    ));
    assert!(matches!(
        h.flow.login(login_as("nobody", "pw123")).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        h.flow
            .login(LoginRequest {
                password: "pw123".into(),
                ..Default::default()
            })
            .await,
        Err(ServiceError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_login_by_email_stores_refresh_token() {
    let h = harness();
    let user = h.flow.register(alice()).await.unwrap();

    let outcome = h
        .flow
        .login(LoginRequest {
            email: Some(" A@x.com ".into()),
            password: "pw123".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(
        stored.refresh_token.as_deref(),
        Some(outcome.tokens.refresh_token.as_str())
    );

    let claims = h.flow.tokens().verify_access_token(&outcome.tokens.access_token).unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.email.as_deref(), Some("a@x.com"));
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_reuse() {
    let h = harness();
    h.flow.register(alice()).await.unwrap();
    let first = h.flow.login(login_as("alice", "pw123")).await.unwrap().tokens;

    let second = h.flow.refresh(Some(&first.refresh_token)).await.unwrap();
    assert_ne!(first.refresh_token, second.refresh_token);

    assert!(matches!(
        h.flow.refresh(Some(&first.refresh_token)).await,
        Err(ServiceError::Unauthorized(_))
    ));

    h.flow.refresh(Some(&second.refresh_token)).await.unwrap();
}

#[tokio::test]
async fn test_refresh_rejects_missing_and_forged_tokens() {
    let h = harness();
    h.flow.register(alice()).await.unwrap();
    let tokens = h.flow.login(login_as("alice", "pw123")).await.unwrap().tokens;

    assert!(matches!(
        h.flow.refresh(None).await,
        Err(ServiceError::Unauthorized(_))
    ));
    assert!(matches!(
        h.flow.refresh(Some("garbage")).await,
        Err(ServiceError::Unauthorized(_))
    ));
    // An access token is not a refresh token
    assert!(matches!(
        h.flow.refresh(Some(&tokens.access_token)).await,
        Err(ServiceError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_logout_ends_refresh_session() {
    let h = harness();
    let user = h.flow.register(alice()).await.unwrap();
    let tokens = h.flow.login(login_as("alice", "pw123")).await.unwrap().tokens;

    h.flow.logout(user.id).await.unwrap();

    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.refresh_token.is_none());
    assert!(matches!(
        h.flow.refresh(Some(&tokens.refresh_token)).await,
        Err(ServiceError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let h = harness();
    let user = h.flow.register(alice()).await.unwrap();

    h.flow.forgot_password("a@x.com").await.unwrap();
    let message = h.mailer.last_to("a@x.com").unwrap();
    assert_eq!(message.subject, "Password reset request");
    assert!(message
        .text_body
        .contains("http://localhost:5173/reset-password?token="));

    let token = reset_token(&h.mailer);
    h.flow.reset_password(&token, "newpw1").await.unwrap();

    assert!(matches!(
        h.flow.login(login_as("alice", "pw123")).await,
        Err(ServiceError::Unauthorized(_))
    ));
    h.flow.login(login_as("alice", "newpw1")).await.unwrap();

    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.password_reset().is_none());

    assert!(matches!(
        h.flow.reset_password(&token, "again1").await,
        Err(ServiceError::InvalidToken(_))
    ));
}

#[tokio::test]
async fn test_reset_token_expires() {
    let h = harness();
    h.flow.register(alice()).await.unwrap();
    h.flow.forgot_password("a@x.com").await.unwrap();
    let token = reset_token(&h.mailer);

    h.clock.advance(Duration::minutes(21));

    assert!(matches!(
        h.flow.reset_password(&token, "newpw1").await,
        Err(ServiceError::InvalidToken(_))
    ));
    h.flow.login(login_as("alice", "pw123")).await.unwrap();
}

#[tokio::test]
async fn test_forgot_password_unknown_email() {
    let h = harness();
    assert!(matches!(
        h.flow.forgot_password("ghost@x.com").await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(h.mailer.messages().is_empty());
}

#[tokio::test]
async fn test_change_password() {
    let h = harness();
    let user = h.flow.register(alice()).await.unwrap();

    assert!(matches!(
        h.flow.change_password(user.id, "wrong", "newpw1").await,
        Err(ServiceError::BadRequest(msg)) if msg == "Current password is incorrect"
    ));

    h.flow.change_password(user.id, "pw123", "newpw1").await.unwrap();

    assert!(h.flow.login(login_as("alice", "pw123")).await.is_err());
    h.flow.login(login_as("alice", "newpw1")).await.unwrap();
}

#[tokio::test]
async fn test_current_user() {
    let h = harness();
    let user = h.flow.register(alice()).await.unwrap();

    let current = h.flow.current_user(user.id).await.unwrap();
    assert_eq!(current.email, "a@x.com");
    assert_eq!(current.full_name.as_deref(), Some("Alice Liddell"));

    assert!(matches!(
        h.flow.current_user(uuid::Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_alice_scenario() {
    let h = harness();
    h.flow.register(alice()).await.unwrap();

    let token = verification_token(&h.mailer);
    h.flow.verify_email(&token).await.unwrap();

    assert!(matches!(
        h.flow.login(login_as("alice", "nope")).await,
        Err(ServiceError::Unauthorized(_))
    ));

    let outcome = h.flow.login(login_as("alice", "pw123")).await.unwrap();
    assert!(outcome.user.is_email_verified);
}

#[tokio::test]
async fn test_mail_failures_do_not_fail_the_request() {
    let h = harness_with(Some(Arc::new(UnreachableMailer)));

    let user = h.flow.register(alice()).await.unwrap();
    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.email_verification().is_some());

    h.flow.resend_verification(user.id).await.unwrap();

    h.flow.forgot_password("a@x.com").await.unwrap();
    let stored = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.password_reset().is_some());

    h.flow.login(login_as("alice", "pw123")).await.unwrap();
}

#[tokio::test]
async fn test_user_update_constructors() {
    let h = harness();
    let user = h.flow.register(alice()).await.unwrap();
    let reset = TemporaryToken::generate(Utc::now());

    let stored = h
        .store
        .update_user(
            user.id,
            UserUpdate::reset_slot(Some(reset.hashed.clone()))
                .and_refresh_token(Some("refresh".into())),
            SaveMode::SkipValidation,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.password_reset(), Some(reset.hashed));
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));

    let stored = h
        .store
        .update_user(user.id, UserUpdate::verified(), SaveMode::SkipValidation)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_email_verified);
    assert!(stored.email_verification().is_none());

    let stored = h
        .store
        .update_user(
            user.id,
            UserUpdate::reset_slot(None)
                .and_refresh_token(None)
                .with_password("newpw1")
                .unwrap(),
            SaveMode::Validated,
        )
        .await
        .unwrap()
        .unwrap();
    assert!(stored.password_reset().is_none());
    assert!(stored.refresh_token.is_none());
    h.flow.login(login_as("alice", "newpw1")).await.unwrap();
}
