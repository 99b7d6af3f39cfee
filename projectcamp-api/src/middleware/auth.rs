/// Access control middleware
///
/// Two gates, applied per route:
///
/// 1. [`require_auth`]: resolves the caller from the bearer header or the
///    `accessToken` cookie and inserts an [`AuthContext`]
/// 2. [`require_role`]: looks up the caller's membership of the `:projectId`
///    project and inserts a
///    [`ProjectAccess`](projectcamp_shared::auth::authorization::ProjectAccess) if the role is allowed
///
/// `require_auth` must wrap every route that uses `require_role`.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::delete, Router};
/// use projectcamp_api::app::AppState;
/// use projectcamp_api::middleware::auth::{require_auth, require_role};
/// use projectcamp_shared::auth::authorization::PROJECT_ADMINS;
///
/// async fn delete_project() -> &'static str {
///     "deleted"
/// }
///
/// fn routes(state: AppState) -> Router<AppState> {
///     Router::new()
///         .route(
///             "/:projectId",
///             delete(delete_project).route_layer(middleware::from_fn_with_state(
///                 state.clone(),
///                 require_role(PROJECT_ADMINS),
///             )),
///         )
///         .route_layer(middleware::from_fn_with_state(state, require_auth))
/// }
/// ```

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
    RequestPartsExt,
};
use projectcamp_shared::{
    auth::{
        authorization::authorize_project,
        middleware::{authenticate, AuthContext},
    },
    models::project_member::ProjectRole,
};
use std::{collections::HashMap, future::Future, pin::Pin};
use tracing::debug;

use crate::{app::AppState, error::ApiError};

/// Boxed future returned by [`require_role`] middleware
pub type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send>>;

/// Authenticates the request and inserts an [`AuthContext`]
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = authenticate(&*state.store, &state.tokens, req.headers()).await?;

    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

/// Checks the caller's project role and inserts a `ProjectAccess`
pub async fn authorize_layer(
    state: AppState,
    allowed: &'static [ProjectRole],
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = req.into_parts();

    let user_id = parts
        .extensions
        .get::<AuthContext>()
        .map(AuthContext::user_id)
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized request".to_string()))?;

    let params = parts
        .extract::<Path<HashMap<String, String>>>()
        .await
        .map(|Path(params)| params)
        .unwrap_or_default();

    let access = authorize_project(
        &*state.store,
        user_id,
        params.get("projectId").map(String::as_str),
        allowed,
    )
    .await?;

    debug!(user_id = %user_id, project_id = %access.project_id, role = %access.role, "Project access granted");
    parts.extensions.insert(access);

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Creates a role-check middleware closure for `allowed`
///
/// Use with `axum::middleware::from_fn_with_state`.
pub fn require_role(
    allowed: &'static [ProjectRole],
) -> impl Fn(State<AppState>, Request, Next) -> MiddlewareFuture + Clone + Send + Sync + 'static {
    move |State(state): State<AppState>, req: Request, next: Next| -> MiddlewareFuture {
        Box::pin(authorize_layer(state, allowed, req, next))
    }
}
