//! Address book routes, including bulk upsert and import from a WhatsApp group.

use super::{bad_request, error_response, not_found, parse_body, require_user, required};
use super::{ApiError, ApiState, IdParam};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use evopanel_core::phone::digits_only;
use evopanel_store::{ContactFilter, ContactInput};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub(super) struct ContactQuery {
    search: Option<String>,
    active: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ContactRequest {
    name: Option<String>,
    phone: Option<String>,
    tags: Option<String>,
    notes: Option<String>,
    active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkContact {
    name: Option<String>,
    phone: Option<Value>,
    tags: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkRequest {
    contacts: Option<Vec<BulkContact>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ImportRequest {
    instance_id: Option<IdParam>,
    group_jid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkDeleteRequest {
    ids: Option<Vec<i64>>,
}

/// Empty optional text becomes `None`.
fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ContactRequest {
    fn into_input(self) -> Result<(ContactInput, Option<bool>), ApiError> {
        let (Some(name), Some(phone)) = (required(&self.name), required(&self.phone)) else {
            return Err(bad_request("name and phone are required"));
        };
        let input = ContactInput {
            name: name.to_string(),
            phone: phone.to_string(),
            tags: optional(self.tags),
            notes: optional(self.notes),
        };
        Ok((input, self.active))
    }
}

/// `GET /api/contacts?search=&active=`
pub(super) async fn list_contacts(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Query(query): Query<ContactQuery>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;

    let filter = ContactFilter {
        search: query.search,
        active: match query.active.as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        },
    };
    let contacts = state
        .store
        .list_contacts(&filter)
        .await
        .map_err(error_response)?;
    Ok(Json(json!(contacts)))
}

/// `POST /api/contacts`
pub(super) async fn create_contact(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_user(&headers, &state)?;
    let (input, _) = parse_body(body)?.into_input()?;

    let contact = state
        .store
        .create_contact(&input)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(json!(contact))))
}

/// `PUT /api/contacts/{id}`
pub(super) async fn update_contact(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    body: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;
    let (input, active) = parse_body(body)?.into_input()?;

    let contact = state
        .store
        .update_contact(id, &input, active)
        .await
        .map_err(error_response)?
        .ok_or_else(|| not_found("contact not found"))?;
    Ok(Json(json!(contact)))
}

/// `DELETE /api/contacts/{id}`
pub(super) async fn delete_contact(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;

    if !state.store.delete_contact(id).await.map_err(error_response)? {
        return Err(not_found("contact not found"));
    }
    Ok(Json(json!({"success": true})))
}

/// `POST /api/contacts/bulk`
///
/// Upserts by phone. Entries whose phone has no digits are skipped; a missing
/// name falls back to the phone.
pub(super) async fn bulk_save(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;
    let req = parse_body(body)?;

    let contacts = req.contacts.unwrap_or_default();
    if contacts.is_empty() {
        return Err(bad_request(
            "send a \"contacts\" array with at least one contact",
        ));
    }

    let mut saved = 0usize;
    for c in contacts {
        // Spreadsheets often hand phones over as numbers.
        let raw_phone = match &c.phone {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        let Some(phone) = digits_only(&raw_phone) else {
            continue;
        };

        let input = ContactInput {
            name: required(&c.name).map(str::to_string).unwrap_or_else(|| phone.clone()),
            phone,
            tags: optional(c.tags),
            notes: optional(c.notes),
        };
        state
            .store
            .upsert_contact(&input)
            .await
            .map_err(error_response)?;
        saved += 1;
    }

    info!("contacts: bulk saved {saved}");
    Ok(Json(json!({ "saved": saved })))
}

/// `POST /api/contacts/import-from-group`
///
/// Pulls the group's participants from the provider and upserts each distinct
/// phone. Known groups tag their contacts with `grupo:<name>`.
pub(super) async fn import_from_group(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<ImportRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;
    let req = parse_body(body)?;

    let (Some(instance_id), Some(group_jid)) = (req.instance_id, required(&req.group_jid)) else {
        return Err(bad_request("instanceId and groupJid are required"));
    };

    let instance = match instance_id.resolve() {
        Some(id) => state.store.get_instance(id).await.map_err(error_response)?,
        None => None,
    }
    .ok_or_else(|| not_found("instance not found"))?;

    let group = state
        .store
        .find_group(instance.id, group_jid)
        .await
        .map_err(error_response)?;

    let participants = state
        .instances
        .fetch_participants(&instance.evolution_instance_id, group_jid)
        .await
        .map_err(error_response)?;

    if participants.is_empty() {
        return Ok(Json(json!({
            "totalFound": 0,
            "saved": 0,
            "message": "the provider returned no participants",
        })));
    }

    let (tags, notes) = match &group {
        Some(g) => (
            Some(format!("grupo:{}", g.name)),
            format!("Imported from group {} (instance {})", g.name, instance.name),
        ),
        None => (None, format!("Imported from instance {}", instance.name)),
    };

    let mut seen = HashSet::new();
    let mut saved = 0usize;
    for p in &participants {
        if !seen.insert(p.phone.as_str()) {
            continue;
        }
        let name = p
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| group.as_ref().map(|g| g.name.clone()))
            .unwrap_or_else(|| p.phone.clone());

        let input = ContactInput {
            name,
            phone: p.phone.clone(),
            tags: tags.clone(),
            notes: Some(notes.clone()),
        };
        state
            .store
            .upsert_contact(&input)
            .await
            .map_err(error_response)?;
        saved += 1;
    }

    info!(
        "contacts: imported {saved} of {} participant(s) from {group_jid}",
        participants.len()
    );
    Ok(Json(json!({
        "totalFound": participants.len(),
        "saved": saved,
    })))
}

/// `POST /api/contacts/bulk-delete`
pub(super) async fn bulk_delete(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_user(&headers, &state)?;
    let req = parse_body(body)?;

    let ids = req.ids.unwrap_or_default();
    if ids.is_empty() {
        return Err(bad_request("no contacts selected"));
    }

    let deleted = state
        .store
        .delete_contacts(&ids)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}
