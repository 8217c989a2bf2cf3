//! Login and user administration.

use super::{bad_request, error_response, not_found, parse_body, require_admin, require_user};
use super::{required, ApiError, ApiState};
use crate::auth::{hash_password, verify_password, Role};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RegisterRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateUserRequest {
    name: Option<String>,
    email: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PasswordRequest {
    password: Option<String>,
}

/// Missing role means `user`.
fn parse_role(role: &Option<String>) -> Result<Role, ApiError> {
    match required(role) {
        None => Ok(Role::User),
        Some(r) => r.parse().map_err(error_response),
    }
}

fn invalid_credentials() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "invalid credentials"})),
    )
}

/// `POST /api/auth/login`
pub(super) async fn login(
    State(state): State<ApiState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let req = parse_body(body)?;
    let (Some(email), Some(password)) = (required(&req.email), req.password.as_deref()) else {
        return Err(bad_request("email and password are required"));
    };

    let user = state
        .store
        .find_user_by_email(email)
        .await
        .map_err(error_response)?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(password, &user.password_hash) {
        return Err(invalid_credentials());
    }

    // Rows written before roles were enforced count as plain users.
    let role = user.role.parse().unwrap_or(Role::User);
    let token = state
        .tokens
        .issue(user.id, &user.name, &user.email, role)
        .map_err(error_response)?;

    info!("login: {} ({})", user.email, role.as_str());

    Ok(Json(json!({
        "token": token,
        "user": {
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "role": role,
        },
    })))
}

/// `POST /api/auth/register` (admin)
pub(super) async fn register(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_admin(&headers, &state)?;
    let req = parse_body(body)?;

    let (Some(name), Some(email), Some(password)) = (
        required(&req.name),
        required(&req.email),
        req.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(bad_request("name, email and password are required"));
    };
    let role = parse_role(&req.role)?;

    let hash = hash_password(password).map_err(error_response)?;
    let user = state
        .store
        .create_user(name, email, &hash, role.as_str())
        .await
        .map_err(error_response)?;

    info!("registered user {} as {}", user.email, user.role);
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

/// `GET /api/auth/me`
pub(super) async fn me(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    let claims = require_user(&headers, &state)?;
    Ok(Json(json!({ "user": claims })))
}

/// `GET /api/auth/users` (admin)
pub(super) async fn list_users(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    let users = state.store.list_users().await.map_err(error_response)?;
    Ok(Json(json!(users)))
}

/// `PUT /api/auth/users/{id}` (admin)
pub(super) async fn update_user(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    let req = parse_body(body)?;

    let (Some(name), Some(email)) = (required(&req.name), required(&req.email)) else {
        return Err(bad_request("name and email are required"));
    };
    let role = parse_role(&req.role)?;

    let user = state
        .store
        .update_user(id, name, email, role.as_str())
        .await
        .map_err(error_response)?
        .ok_or_else(|| not_found("user not found"))?;

    Ok(Json(json!(user)))
}

/// `PATCH /api/auth/users/{id}/password` (admin)
pub(super) async fn change_password(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    body: Result<Json<PasswordRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;
    let req = parse_body(body)?;

    let Some(password) = req.password.as_deref().filter(|p| !p.is_empty()) else {
        return Err(bad_request("new password is required"));
    };

    let hash = hash_password(password).map_err(error_response)?;
    if !state
        .store
        .set_password(id, &hash)
        .await
        .map_err(error_response)?
    {
        return Err(not_found("user not found"));
    }

    Ok(Json(json!({"message": "password updated"})))
}

/// `DELETE /api/auth/users/{id}` (admin)
pub(super) async fn delete_user(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state)?;

    if !state.store.delete_user(id).await.map_err(error_response)? {
        return Err(not_found("user not found"));
    }

    info!("deleted user {id}");
    Ok(Json(json!({"message": "user removed"})))
}
