//! Evolution API client.
//!
//! Wraps the HTTP endpoints the panel needs: text/media send, instance
//! provisioning, QR pairing, connection state, and group discovery. Stateless
//! apart from the connection pool; no retries and no timeout override.

mod response;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use evopanel_core::{
    config::EvolutionConfig,
    error::PanelError,
    instance::{ConnectionState, CreatedInstance, GroupInfo, Participant, QrPayload},
    message::DeliveryReceipt,
    traits::{InstanceManager, MessagingProvider},
};
use reqwest::Url;
use response::{CreateResponse, GroupsResponse, ParticipantsResponse, StateResponse};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// File name the provider attaches to outgoing images.
const MEDIA_FILE_NAME: &str = "imagem.jpg";

/// Evolution API provider.
pub struct EvolutionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EvolutionClient {
    /// Create from config values.
    pub fn from_config(config: &EvolutionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PanelError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PanelError::Config(format!("invalid evolution base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| PanelError::Config("evolution base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url, query: &[(&str, &str)]) -> Result<Value, PanelError> {
        debug!("evolution: GET {url}");
        let resp = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(resp).await
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<Value, PanelError> {
        debug!("evolution: POST {url}");
        let resp = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(resp).await
    }

    /// Whether the Evolution server answers at its base URL.
    pub async fn ping(&self) -> bool {
        let url = match self.endpoint(&[]) {
            Ok(u) => u,
            Err(e) => {
                warn!("evolution not available: {e}");
                return false;
            }
        };
        match self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("evolution not available: {e}");
                false
            }
        }
    }
}

/// Strip a `data:<mime>;base64,` prefix, leaving the bare payload.
///
/// URLs and raw base64 are returned unchanged.
pub fn strip_data_uri(media: &str) -> &str {
    if media.starts_with("data:") {
        if let Some((_, payload)) = media.split_once(',') {
            return payload;
        }
    }
    media
}

fn transport_error(e: reqwest::Error) -> PanelError {
    PanelError::Provider {
        status: None,
        body: format!("evolution request failed: {e}"),
    }
}

/// Non-2xx becomes a provider error carrying status and body. An empty 2xx body is `null`.
async fn read_json(resp: reqwest::Response) -> Result<Value, PanelError> {
    let status = resp.status();
    let text = resp.text().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(PanelError::Provider {
            status: Some(status.as_u16()),
            body: text,
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&text).map_err(|e| PanelError::Provider {
        status: Some(status.as_u16()),
        body: format!("evolution: failed to parse response: {e}"),
    })
}

fn parse_shape<T: serde::de::DeserializeOwned>(raw: Value, what: &str) -> Result<T, PanelError> {
    serde_json::from_value(raw).map_err(|e| PanelError::Provider {
        status: None,
        body: format!("evolution: unexpected {what} response: {e}"),
    })
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    number: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMediaRequest<'a> {
    number: &'a str,
    mediatype: &'a str,
    media: &'a str,
    file_name: &'a str,
    caption: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateInstanceRequest<'a> {
    instance_name: &'a str,
    qrcode: bool,
    integration: &'a str,
}

#[async_trait]
impl MessagingProvider for EvolutionClient {
    fn name(&self) -> &str {
        "evolution"
    }

    async fn send_text(
        &self,
        instance: &str,
        recipient: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, PanelError> {
        let url = self.endpoint(&["message", "sendText", instance])?;
        let body = SendTextRequest {
            number: recipient,
            text,
        };
        self.post_json(url, &body).await.map(DeliveryReceipt)
    }

    async fn send_media(
        &self,
        instance: &str,
        recipient: &str,
        media: &str,
        caption: &str,
    ) -> Result<DeliveryReceipt, PanelError> {
        let url = self.endpoint(&["message", "sendMedia", instance])?;
        let body = SendMediaRequest {
            number: recipient,
            mediatype: "image",
            media: strip_data_uri(media),
            file_name: MEDIA_FILE_NAME,
            caption,
        };
        self.post_json(url, &body).await.map(DeliveryReceipt)
    }
}

#[async_trait]
impl InstanceManager for EvolutionClient {
    async fn create_instance(&self, name: &str) -> Result<CreatedInstance, PanelError> {
        let url = self.endpoint(&["instance", "create"])?;
        let body = CreateInstanceRequest {
            instance_name: name,
            qrcode: true,
            integration: "WHATSAPP-BAILEYS",
        };
        let raw = self.post_json(url, &body).await?;
        let parsed: CreateResponse = parse_shape(raw.clone(), "create instance")?;
        let instance_ref = parsed.instance_ref().ok_or_else(|| PanelError::Provider {
            status: None,
            body: format!("could not identify the instance id returned by Evolution: {raw}"),
        })?;
        Ok(CreatedInstance { instance_ref, raw })
    }

    async fn connect(&self, instance: &str) -> Result<QrPayload, PanelError> {
        let url = self.endpoint(&["instance", "connect", instance])?;
        let raw = self.get_json(url, &[]).await?;
        Ok(QrPayload::from_raw(raw))
    }

    async fn connection_state(&self, instance: &str) -> Result<ConnectionState, PanelError> {
        let url = self.endpoint(&["instance", "connectionState", instance])?;
        let raw = self.get_json(url, &[]).await?;
        let parsed: StateResponse = parse_shape(raw, "connection state")?;
        Ok(ConnectionState {
            state: parsed.state(),
        })
    }

    async fn fetch_groups(&self, instance: &str) -> Result<Vec<GroupInfo>, PanelError> {
        let url = self.endpoint(&["group", "fetchAllGroups", instance])?;
        let raw = self
            .get_json(url, &[("getParticipants", "false")])
            .await?;
        let parsed: GroupsResponse = parse_shape(raw, "groups")?;
        Ok(parsed.into_groups())
    }

    async fn fetch_participants(
        &self,
        instance: &str,
        group_jid: &str,
    ) -> Result<Vec<Participant>, PanelError> {
        let url = self.endpoint(&["group", "participants", instance])?;
        let raw = self.get_json(url, &[("groupJid", group_jid)]).await?;
        let parsed: ParticipantsResponse = parse_shape(raw, "participants")?;
        Ok(parsed.into_participants())
    }
}
