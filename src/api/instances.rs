//! Instance provisioning, QR pairing, and status sync.

use super::{bad_request, error_response, not_found, parse_body, require_user, required};
use super::{ApiError, ApiState};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    response::Json,
};
use evopanel_core::phone::digits_only;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub(super) struct CreateInstanceRequest {
    name: Option<String>,
    phone: Option<String>,
}

/// `POST /api/instances`: provision on the provider, then record as `pending`.
pub(super) async fn create_instance(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<CreateInstanceRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;
    let req = parse_body(body)?;

    let Some(name) = required(&req.name) else {
        return Err(bad_request("instance name is required"));
    };
    let phone = req.phone.as_deref().and_then(digits_only);

    let created = state
        .instances
        .create_instance(name)
        .await
        .map_err(error_response)?;

    let instance = state
        .store
        .create_instance(name, phone.as_deref(), &created.instance_ref)
        .await
        .map_err(error_response)?;

    info!(
        "created instance {} ({}) on provider as {}",
        instance.id, instance.name, instance.evolution_instance_id
    );
    Ok(Json(json!(instance)))
}

/// `GET /api/instances`
pub(super) async fn list_instances(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;
    let instances = state.store.list_instances().await.map_err(error_response)?;
    Ok(Json(json!(instances)))
}

/// `GET /api/instances/{id}/qr`: returns the provider payload untouched.
pub(super) async fn qr_code(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;

    let instance = state
        .store
        .get_instance(id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| not_found("instance not found"))?;

    let payload = state
        .instances
        .connect(&instance.evolution_instance_id)
        .await
        .map_err(error_response)?;

    let status = payload.derived_status(&instance.status);
    state
        .store
        .update_instance_qr(id, payload.qrcode.as_deref(), &status)
        .await
        .map_err(error_response)?;

    Ok(Json(payload.raw))
}

/// `DELETE /api/instances/{id}`: local record only; the provider keeps its session.
pub(super) async fn delete_instance(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;

    if !state.store.delete_instance(id).await.map_err(error_response)? {
        return Err(not_found("instance not found"));
    }
    Ok(Json(json!({"success": true})))
}

/// `GET /api/instances/sync-status`
///
/// Refreshes every instance from the provider's connection state. One failing
/// instance is logged and skipped; the rest still sync.
pub(super) async fn sync_status(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;

    let instances = state.store.list_instances().await.map_err(error_response)?;
    for inst in &instances {
        let connection = match state
            .instances
            .connection_state(&inst.evolution_instance_id)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!("sync: instance {} failed: {e}", inst.evolution_instance_id);
                continue;
            }
        };

        let Some(status) = connection.panel_status() else {
            continue;
        };
        if status != inst.status {
            if let Err(e) = state.store.update_instance_status(inst.id, &status).await {
                warn!("sync: could not store status for instance {}: {e}", inst.id);
            }
        }
    }

    Ok(Json(json!({"ok": true})))
}
