//! Single-target sends, bulk submission, and queue status.
//!
//! Single sends call the provider inline. Bulk sends expand into one
//! [`DispatchJob`] per target and return as soon as the batch is queued.

use super::{bad_request, error_response, non_blank, parse_body, require_sender, required};
use super::{resolve_instance_ref, ApiError, ApiState, IdParam};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use evopanel_core::message::{DispatchJob, JobContent, MessageKind};
use evopanel_providers::evolution::strip_data_uri;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SendTextRequest {
    instance_id: Option<IdParam>,
    to: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SendImageRequest {
    instance_id: Option<IdParam>,
    to: Option<String>,
    image_url: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BulkRequest {
    instance_id: Option<IdParam>,
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    image_url: Option<String>,
    caption: Option<String>,
    targets: Option<Vec<String>>,
    delay_ms: Option<DelayParam>,
}

/// Pacing delay as clients send it: JSON number or numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(super) enum DelayParam {
    Num(f64),
    Text(String),
}

impl DelayParam {
    /// Positive whole milliseconds, or `None` for anything that is not a usable delay.
    fn millis(&self) -> Option<u64> {
        let ms = match self {
            Self::Num(n) => *n,
            Self::Text(s) => s.trim().parse().ok()?,
        };
        (ms.is_finite() && ms > 0.0).then_some(ms as u64)
    }
}

/// Parse the wire kind (`"text"` or `"image"`).
fn parse_kind(kind: &str) -> Result<MessageKind, ApiError> {
    serde_json::from_value(Value::String(kind.to_string()))
        .map_err(|_| bad_request(format!("unknown type '{kind}', expected 'text' or 'image'")))
}

/// Accept an http(s) URL, a data-URI, or raw base64.
fn check_media(media: &str) -> Result<(), ApiError> {
    if media.starts_with("http://") || media.starts_with("https://") {
        return Ok(());
    }
    let payload: String = strip_data_uri(media)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(payload.as_bytes())
        .map(|_| ())
        .map_err(|_| bad_request("imageUrl must be an http(s) URL, a data-URI or base64"))
}

/// `POST /api/send/text`
pub(super) async fn send_text(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<SendTextRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_sender(&headers, &state)?;
    let req = parse_body(body)?;

    let (Some(instance_id), Some(to), Some(message)) =
        (req.instance_id, required(&req.to), non_blank(&req.message))
    else {
        return Err(bad_request("instanceId, to and message are required"));
    };

    let instance_ref = resolve_instance_ref(&state.store, &instance_id).await?;
    let sent = state
        .provider
        .send_text(&instance_ref, to, message)
        .await
        .map_err(|e| error_response(e.with_context(to, MessageKind::Text.as_str())))?;

    Ok(Json(json!({"success": true, "sent": sent})))
}

/// `POST /api/send/image`
pub(super) async fn send_image(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<SendImageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_sender(&headers, &state)?;
    let req = parse_body(body)?;

    let (Some(instance_id), Some(to), Some(image)) =
        (req.instance_id, required(&req.to), required(&req.image_url))
    else {
        return Err(bad_request("instanceId, to and imageUrl are required"));
    };
    check_media(image)?;
    let caption = req.caption.as_deref().unwrap_or_default();

    let instance_ref = resolve_instance_ref(&state.store, &instance_id).await?;
    let sent = state
        .provider
        .send_media(&instance_ref, to, image, caption)
        .await
        .map_err(|e| error_response(e.with_context(to, MessageKind::Media.as_str())))?;

    Ok(Json(json!({"success": true, "sent": sent})))
}

/// `POST /api/send/bulk`
///
/// Validates, resolves the instance once, queues one job per target in target
/// order, and answers without waiting for any delivery.
pub(super) async fn send_bulk(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    require_sender(&headers, &state)?;
    let req = parse_body(body)?;

    let targets = req.targets.unwrap_or_default();
    let (Some(instance_id), Some(kind)) = (req.instance_id, required(&req.kind)) else {
        return Err(bad_request("instanceId, type and targets (array) are required"));
    };
    if targets.is_empty() {
        return Err(bad_request("instanceId, type and targets (array) are required"));
    }

    let content = match parse_kind(kind)? {
        MessageKind::Text => {
            let Some(text) = non_blank(&req.message) else {
                return Err(bad_request("message is required for type \"text\""));
            };
            JobContent::Text {
                body: text.to_string(),
            }
        }
        MessageKind::Media => {
            let Some(media) = required(&req.image_url) else {
                return Err(bad_request("imageUrl is required for type \"image\""));
            };
            check_media(media)?;
            let caption = non_blank(&req.caption)
                .or_else(|| non_blank(&req.message))
                .unwrap_or_default();
            JobContent::Media {
                media: media.to_string(),
                caption: caption.to_string(),
            }
        }
    };

    // Negative, non-numeric or non-finite delays count as "not given".
    let requested = req.delay_ms.as_ref().and_then(DelayParam::millis);
    let delay_ms = state.dispatch.clamp_delay(requested);

    let instance_ref = resolve_instance_ref(&state.store, &instance_id).await?;

    let jobs: Vec<DispatchJob> = targets
        .iter()
        .map(|to| {
            DispatchJob::new(
                instance_ref.as_str(),
                to.as_str(),
                content.clone(),
                Duration::from_millis(delay_ms),
            )
        })
        .collect();

    let outcome = state.queue.submit(jobs).await;
    info!(
        "send: queued {} {} job(s) on {instance_ref}, delay {delay_ms}ms",
        outcome.queued,
        content.kind().as_str()
    );

    Ok(Json(json!({
        "success": true,
        "queued": outcome.queued,
        "delayMs": delay_ms,
        "processing": outcome.processing,
    })))
}

/// `GET /api/send/queue/status`
pub(super) async fn queue_status(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    require_sender(&headers, &state)?;
    let status = state.queue.status().await;
    Ok(Json(json!({
        "pending": status.pending,
        "processing": status.processing,
        "defaultDelayMs": state.queue.default_delay().as_millis() as u64,
    })))
}
