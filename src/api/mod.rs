//! HTTP API for the panel frontend and external integrations.
//!
//! Session routes use JWT bearer tokens. The send routes also accept the static
//! panel token so scripts can push messages without a user login.

mod accounts;
mod contacts;
mod groups;
mod instances;
mod send;


use crate::auth::{constant_time_eq, Claims, TokenIssuer};
use crate::dispatch::DispatchQueue;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::Json,
    routing::{delete, get, patch, post, put},
    Router,
};
use evopanel_core::{
    config::{ApiConfig, AuthConfig, DispatchConfig},
    error::PanelError,
    traits::{InstanceManager, MessagingProvider},
};
use evopanel_store::Store;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Error half of every handler result: status plus `{"error": ...}`.
pub(crate) type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    store: Store,
    provider: Arc<dyn MessagingProvider>,
    instances: Arc<dyn InstanceManager>,
    queue: DispatchQueue,
    tokens: TokenIssuer,
    panel_token: Option<String>,
    dispatch: DispatchConfig,
}

impl ApiState {
    pub fn new(
        store: Store,
        provider: Arc<dyn MessagingProvider>,
        instances: Arc<dyn InstanceManager>,
        queue: DispatchQueue,
        auth: &AuthConfig,
        dispatch: DispatchConfig,
    ) -> Self {
        let panel_token = if auth.panel_token.is_empty() {
            None
        } else {
            Some(auth.panel_token.clone())
        };
        Self {
            store,
            provider,
            instances,
            queue,
            tokens: TokenIssuer::from_config(auth),
            panel_token,
            dispatch,
        }
    }
}

/// Map a domain error onto a status code and a JSON body.
pub(crate) fn error_response(e: PanelError) -> ApiError {
    let status = match &e {
        PanelError::Validation(_) => StatusCode::BAD_REQUEST,
        PanelError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        PanelError::Forbidden(_) => StatusCode::FORBIDDEN,
        PanelError::NotFound(_) => StatusCode::NOT_FOUND,
        PanelError::Conflict(_) => StatusCode::CONFLICT,
        PanelError::Provider { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("api: {e}");
    }
    (status, Json(json!({"error": e.to_string()})))
}

pub(crate) fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({"error": msg.into()})))
}

pub(crate) fn not_found(msg: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({"error": msg.into()})))
}

fn unauthorized(msg: &str) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": msg})))
}

/// Unwrap a JSON body, turning a rejection into a 400.
pub(crate) fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|e| bad_request(format!("invalid request: {e}")))
}

/// Trimmed, non-empty text field.
pub(crate) fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Non-blank free text, passed through untouched.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// A record id as clients send it: JSON number or numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdParam {
    Num(i64),
    Text(String),
}

impl IdParam {
    /// `None` for ids that cannot name a row.
    pub(crate) fn resolve(&self) -> Option<i64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Provider reference of a panel instance, or 404.
pub(crate) async fn resolve_instance_ref(
    store: &Store,
    instance_id: &IdParam,
) -> Result<String, ApiError> {
    let Some(id) = instance_id.resolve() else {
        return Err(not_found("instance not found"));
    };
    store
        .provider_ref(id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| not_found("instance not found"))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("missing token"))?;
    let value = raw
        .to_str()
        .map_err(|_| unauthorized("invalid Authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| unauthorized("invalid token"))
}

/// Any logged-in user.
pub(crate) fn require_user(headers: &HeaderMap, state: &ApiState) -> Result<Claims, ApiError> {
    let token = bearer_token(headers)?;
    state.tokens.validate(token).map_err(error_response)
}

/// Logged-in admin; other users get 403.
pub(crate) fn require_admin(headers: &HeaderMap, state: &ApiState) -> Result<Claims, ApiError> {
    let claims = require_user(headers, state)?;
    if !claims.is_admin() {
        return Err(error_response(PanelError::Forbidden(
            "only administrators can perform this action".into(),
        )));
    }
    Ok(claims)
}

/// Send routes: the static panel token or any valid session.
pub(crate) fn require_sender(headers: &HeaderMap, state: &ApiState) -> Result<(), ApiError> {
    let token = bearer_token(headers)?;
    if let Some(ref expected) = state.panel_token {
        if constant_time_eq(token, expected) {
            return Ok(());
        }
    }
    state
        .tokens
        .validate(token)
        .map(|_| ())
        .map_err(error_response)
}

/// `GET /api/health`: store round-trip.
async fn health(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    match state.store.db_time().await {
        Ok(db_time) => Ok(Json(json!({"ok": true, "dbTime": db_time}))),
        Err(e) => {
            error!("health check failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"ok": false, "error": e.to_string()})),
            ))
        }
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin.is_empty() {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(e) => {
            warn!("invalid CORS origin '{origin}', allowing any origin: {e}");
            CorsLayer::permissive()
        }
    }
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState, config: &ApiConfig) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // Accounts
        .route("/api/auth/login", post(accounts::login))
        .route("/api/auth/register", post(accounts::register))
        .route("/api/auth/me", get(accounts::me))
        .route("/api/auth/users", get(accounts::list_users))
        .route(
            "/api/auth/users/{id}",
            put(accounts::update_user).delete(accounts::delete_user),
        )
        .route(
            "/api/auth/users/{id}/password",
            patch(accounts::change_password),
        )
        // Instances
        .route(
            "/api/instances",
            get(instances::list_instances).post(instances::create_instance),
        )
        .route("/api/instances/sync-status", get(instances::sync_status))
        .route("/api/instances/{id}", delete(instances::delete_instance))
        .route("/api/instances/{id}/qr", get(instances::qr_code))
        // Groups
        .route("/api/groups/{instance_id}", get(groups::list_groups))
        .route("/api/groups/{instance_id}/refresh", post(groups::refresh_groups))
        // Contacts
        .route(
            "/api/contacts",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route("/api/contacts/bulk", post(contacts::bulk_save))
        .route("/api/contacts/import-from-group", post(contacts::import_from_group))
        .route("/api/contacts/bulk-delete", post(contacts::bulk_delete))
        .route(
            "/api/contacts/{id}",
            put(contacts::update_contact).delete(contacts::delete_contact),
        )
        // Sending
        .route("/api/send/text", post(send::send_text))
        .route("/api/send/image", post(send::send_image))
        .route("/api/send/bulk", post(send::send_bulk))
        .route("/api/send/queue/status", get(send::queue_status))
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors_layer(&config.cors_origin))
        .with_state(state)
}

/// Bind and serve until the process stops.
pub async fn serve(config: &ApiConfig, state: ApiState) -> Result<(), PanelError> {
    let app = build_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!("API server failed to bind to {addr}: {e}");
        e
    })?;

    info!("API server listening on {addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
