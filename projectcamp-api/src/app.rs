/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use projectcamp_api::{app::{build_router, AppState}, config::Config};
/// use projectcamp_shared::{mail::LogMailer, store::postgres::PgStore};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let store = PgStore::connect(config.database.pool_config()).await?;
/// let state = AppState::new(Arc::new(store), Arc::new(LogMailer), config);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
/// axum::serve(listener, build_router(state)).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        auth::{require_auth, require_role},
        security::SecurityHeadersLayer,
    },
    routes,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use projectcamp_shared::{
    auth::{
        authorization::{PROJECT_ADMINS, SUBTASK_EDITORS, TASK_MANAGERS},
        flow::AuthFlow,
        jwt::TokenService,
    },
    mail::Mailer,
    models::project_member::ProjectRole,
    store::DynStore,
};
use std::{sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Persistence for every resource
    pub store: DynStore,

    /// Account lifecycle operations
    pub auth: Arc<AuthFlow>,

    /// Signs and checks access and refresh tokens
    pub tokens: TokenService,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: DynStore, mailer: Arc<dyn Mailer>, config: Config) -> Self {
        let tokens = config.token_service();
        let auth = AuthFlow::new(store.clone(), tokens.clone(), mailer, config.link_config());

        Self::from_parts(store, auth, config)
    }

    /// Builds state around a preconfigured auth flow
    pub fn from_parts(store: DynStore, auth: AuthFlow, config: Config) -> Self {
        Self {
            store,
            tokens: auth.tokens().clone(),
            auth: Arc::new(auth),
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /api/v1
/// ├── GET  /healthcheck
/// ├── /auth
/// │   ├── POST /register, /login, /refresh-token, /forgot-password
/// │   ├── GET  /verify-email/:token
/// │   ├── POST /reset-password/:token
/// │   └── POST /logout, /current-user, /change-password,
/// │            /resend-email-verification          (authenticated)
/// ├── /projects                                     (authenticated)
/// │   ├── GET, POST /
/// │   ├── GET, PUT, DELETE /:projectId
/// │   └── GET, POST /:projectId/members, PUT, DELETE /:projectId/members/:userId
/// └── /tasks/:projectId                             (authenticated)
///     ├── GET, POST /
///     ├── GET, PUT, DELETE /t/:taskId
///     └── POST /t/:taskId/subtasks, PUT, DELETE /t/:taskId/subtasks/:subtaskId
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, compression, tracing, then per
/// route authentication and project role checks.
pub fn build_router(state: AppState) -> Router {
    let guard = |method_router: MethodRouter<AppState>, allowed: &'static [ProjectRole]| {
        method_router.route_layer(from_fn_with_state(state.clone(), require_role(allowed)))
    };
    let authenticated = from_fn_with_state(state.clone(), require_auth);

    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh-token", post(routes::auth::refresh_token))
        .route("/verify-email/:token", get(routes::auth::verify_email))
        .route("/forgot-password", post(routes::auth::forgot_password))
        .route("/reset-password/:token", post(routes::auth::reset_password));

    let session_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/current-user", post(routes::auth::current_user))
        .route("/change-password", post(routes::auth::change_password))
        .route(
            "/resend-email-verification",
            post(routes::auth::resend_email_verification),
        )
        .route_layer(authenticated.clone());

    let project_routes = Router::new()
        .route(
            "/",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/:projectId",
            guard(get(routes::projects::get_project), ProjectRole::ALL)
                .merge(guard(
                    put(routes::projects::update_project).delete(routes::projects::delete_project),
                    PROJECT_ADMINS,
                )),
        )
        .route(
            "/:projectId/members",
            guard(get(routes::members::list_members), ProjectRole::ALL)
                .merge(guard(post(routes::members::add_member), PROJECT_ADMINS)),
        )
        .route(
            "/:projectId/members/:userId",
            guard(
                put(routes::members::update_member_role)
                    .delete(routes::members::remove_member),
                PROJECT_ADMINS,
            ),
        )
        .route_layer(authenticated.clone());

    let task_routes = Router::new()
        .route(
            "/:projectId",
            guard(get(routes::tasks::list_tasks), ProjectRole::ALL)
                .merge(guard(post(routes::tasks::create_task), TASK_MANAGERS)),
        )
        .route(
            "/:projectId/t/:taskId",
            guard(get(routes::tasks::get_task), ProjectRole::ALL).merge(guard(
                put(routes::tasks::update_task).delete(routes::tasks::delete_task),
                TASK_MANAGERS,
            )),
        )
        .route(
            "/:projectId/t/:taskId/subtasks",
            guard(post(routes::tasks::create_subtask), TASK_MANAGERS),
        )
        .route(
            "/:projectId/t/:taskId/subtasks/:subtaskId",
            guard(put(routes::tasks::update_subtask), SUBTASK_EDITORS)
                .merge(guard(
                    delete(routes::tasks::delete_subtask),
                    TASK_MANAGERS,
                )),
        )
        .route_layer(authenticated);

    let v1_routes = Router::new()
        .route("/healthcheck", get(routes::health::health_check))
        .nest("/auth", public_auth_routes.merge(session_routes))
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes);

    Router::new()
        .nest("/api/v1", v1_routes)
        .fallback(route_not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// CORS for the configured origins
///
/// `*` allows any origin without credentials; explicit origins allow
/// credentials so the token cookies travel.
fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
