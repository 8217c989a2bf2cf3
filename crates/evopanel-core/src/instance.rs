//! Normalized views of provider responses for instance lifecycle and groups.
//!
//! The provider answers in several loosely related shapes; the client crate
//! reduces them to these types so the API layer never probes raw JSON.

use serde::Serialize;
use serde_json::Value;

/// Panel status for an instance that still waits for a QR scan.
pub const STATUS_PENDING: &str = "pending";
/// Panel status for a paired, connected instance.
pub const STATUS_CONNECTED: &str = "connected";

/// Result of provisioning an instance on the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedInstance {
    /// Provider-side reference used in every later call.
    pub instance_ref: String,
    /// Untouched provider response.
    pub raw: Value,
}

/// Pairing response: the raw JSON is returned to the caller as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct QrPayload {
    pub raw: Value,
    /// QR code content worth persisting, if the provider sent one.
    pub qrcode: Option<String>,
    /// Status reported alongside the QR, already lower-cased.
    pub status: Option<String>,
}

impl QrPayload {
    /// Build from a raw response. `instance.status` wins over a top-level `status`.
    pub fn from_raw(raw: Value) -> Self {
        let status = raw
            .get("instance")
            .and_then(|i| i.get("status"))
            .filter(|s| !s.is_null())
            .map(value_to_string)
            .or_else(|| raw.get("status").and_then(Value::as_str).map(str::to_string))
            .map(|s| s.to_lowercase());

        let qrcode = raw
            .get("qrcode")
            .filter(|q| !q.is_null())
            .map(value_to_string);

        Self {
            raw,
            qrcode,
            status,
        }
    }

    /// Status to persist after a QR fetch. A bare QR means the instance awaits a scan.
    pub fn derived_status(&self, current: &str) -> String {
        match (&self.status, &self.qrcode) {
            (Some(status), _) => status.clone(),
            (None, Some(_)) => STATUS_PENDING.to_string(),
            (None, None) => current.to_string(),
        }
    }
}

/// Connection state as reported by the provider, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub state: Option<String>,
}

impl ConnectionState {
    /// Map a provider state onto the panel vocabulary.
    ///
    /// `open`/`connected` become `connected`, `connecting`/`pairing` become
    /// `pending`, anything else is kept verbatim. `None` when the provider gave no state.
    pub fn panel_status(&self) -> Option<String> {
        let state = self.state.as_deref()?;
        let mapped = match state {
            "open" | "connected" => STATUS_CONNECTED,
            "connecting" | "pairing" => STATUS_PENDING,
            other => other,
        };
        Some(mapped.to_string())
    }
}

/// A group the instance belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupInfo {
    pub jid: String,
    pub name: String,
}

/// A group participant, reduced to a digits-only phone and an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub phone: String,
    pub name: Option<String>,
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
