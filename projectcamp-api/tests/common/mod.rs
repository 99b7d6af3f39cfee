#![allow(dead_code)]

/// Common test utilities for integration tests
///
/// Builds the real router over an in-memory store and a recording mailer, so
/// the HTTP tests need no database:
/// - Request helpers returning status, headers and the parsed JSON body
/// - Account setup (register, verify, login) returning a bearer token
/// - Token extraction from sent mail

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use projectcamp_api::{
    app::{build_router, AppState},
    config::{ApiConfig, Config, DatabaseConfig, LinksConfig, MailConfig, TokenConfig},
};
use projectcamp_shared::{
    mail::MemoryMailer,
    store::{memory::MemoryStore, DynStore},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["http://localhost:5173".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            url: "postgresql://unused".to_string(),
            max_connections: 1,
        },
        tokens: TokenConfig {
            access_secret: "test-access-secret-at-least-32-characters".to_string(),
            access_expiry: Duration::days(1),
            refresh_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            refresh_expiry: Duration::days(10),
        },
        links: LinksConfig {
            public_base_url: "http://localhost:8000".to_string(),
            forgot_password_redirect_url: "http://localhost:5173/reset-password".to_string(),
        },
        mail: MailConfig {
            api_url: None,
            api_key: None,
            from: "noreply@projectcamp.test".to_string(),
        },
    }
}

/// Parsed response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// All `Set-Cookie` header values
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// `Set-Cookie` value for `name`, if any
    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{}=", name);
        self.set_cookies().into_iter().find(|c| c.starts_with(&prefix))
    }
}

/// Logged-in account
pub struct Session {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

/// Test context containing the router and its collaborators
pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: MemoryMailer,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = MemoryMailer::new();

        let dyn_store: DynStore = store.clone();
        let state = AppState::new(dyn_store, Arc::new(mailer.clone()), test_config());

        Self {
            app: build_router(state),
            store,
            mailer,
        }
    }

    /// Sends a request with optional bearer token, cookie header and JSON body
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, bearer, None, None).await
    }

    pub async fn post(&self, uri: &str, bearer: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, bearer, None, Some(body)).await
    }

    pub async fn put(&self, uri: &str, bearer: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, bearer, None, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, bearer: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, bearer, None, None).await
    }

    /// Registers `username` with `<username>@x.com` and password `pw123`
    pub async fn register(&self, username: &str) -> TestResponse {
        self.post(
            "/api/v1/auth/register",
            None,
            serde_json::json!({
                "username": username,
                "email": format!("{}@x.com", username),
                "password": "pw123",
            }),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.post(
            "/api/v1/auth/login",
            None,
            serde_json::json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Registers and logs in a fresh account
    pub async fn signed_in(&self, username: &str) -> Session {
        let registered = self.register(username).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.body);

        let login = self.login(username, "pw123").await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.body);

        Session {
            user_id: login.body["data"]["user"]["id"]
                .as_str()
                .unwrap()
                .parse()
                .unwrap(),
            access_token: login.body["data"]["accessToken"].as_str().unwrap().to_string(),
            refresh_token: login.body["data"]["refreshToken"].as_str().unwrap().to_string(),
        }
    }

    /// 40-char token following `marker` in the last mail to `to`
    pub fn token_from_mail(&self, to: &str, marker: &str) -> String {
        let message = self.mailer.last_to(to).expect("no mail sent");
        let start = message.text_body.find(marker).expect("no link in mail") + marker.len();
        message.text_body[start..start + 40].to_string()
    }
}
