//! Groups per instance.

use super::{error_response, not_found, require_user, ApiError, ApiState};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

/// `GET /api/groups/{instance_id}`: stored groups, by name.
pub(super) async fn list_groups(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(instance_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;
    let groups = state
        .store
        .list_groups(instance_id)
        .await
        .map_err(error_response)?;
    Ok(Json(json!(groups)))
}

/// `POST /api/groups/{instance_id}/refresh`: pull from the provider, upsert, list.
pub(super) async fn refresh_groups(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(instance_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;

    let instance_ref = state
        .store
        .provider_ref(instance_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| not_found("instance not found"))?;

    let fetched = state
        .instances
        .fetch_groups(&instance_ref)
        .await
        .map_err(error_response)?;

    let saved = state
        .store
        .upsert_groups(instance_id, &fetched)
        .await
        .map_err(error_response)?;
    info!("groups: synced {saved} group(s) for instance {instance_id}");

    let groups = state
        .store
        .list_groups(instance_id)
        .await
        .map_err(error_response)?;
    Ok(Json(json!(groups)))
}
