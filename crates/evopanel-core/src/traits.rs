use crate::{
    error::PanelError,
    instance::{ConnectionState, CreatedInstance, GroupInfo, Participant, QrPayload},
    message::{DeliveryReceipt, DispatchJob, JobContent},
};
use async_trait::async_trait;

/// Messaging provider trait: the outbound edge.
///
/// Every gateway that can deliver WhatsApp messages implements this to give
/// the dispatch queue and the single-target endpoints a uniform interface.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a text message to one recipient (phone number or group jid).
    async fn send_text(
        &self,
        instance: &str,
        recipient: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, PanelError>;

    /// Send an image to one recipient. `media` is a URL, raw base64, or a data-URI.
    async fn send_media(
        &self,
        instance: &str,
        recipient: &str,
        media: &str,
        caption: &str,
    ) -> Result<DeliveryReceipt, PanelError>;

    /// Deliver a queued job, attaching the recipient and kind to any failure.
    async fn deliver(&self, job: &DispatchJob) -> Result<DeliveryReceipt, PanelError> {
        let result = match job.content() {
            JobContent::Text { body } => {
                self.send_text(job.instance_ref(), job.recipient(), body)
                    .await
            }
            JobContent::Media { media, caption } => {
                self.send_media(job.instance_ref(), job.recipient(), media, caption)
                    .await
            }
        };
        result.map_err(|e| e.with_context(job.recipient(), job.kind().as_str()))
    }
}

/// Instance lifecycle on the provider side: provisioning, pairing, and group discovery.
#[async_trait]
pub trait InstanceManager: Send + Sync {
    /// Provision a new instance and return its provider reference.
    async fn create_instance(&self, name: &str) -> Result<CreatedInstance, PanelError>;

    /// Ask the provider for a pairing QR code (or current status if already paired).
    async fn connect(&self, instance: &str) -> Result<QrPayload, PanelError>;

    /// Current connection state of an instance.
    async fn connection_state(&self, instance: &str) -> Result<ConnectionState, PanelError>;

    /// Groups the instance is a member of.
    async fn fetch_groups(&self, instance: &str) -> Result<Vec<GroupInfo>, PanelError>;

    /// Participants of one group.
    async fn fetch_participants(
        &self,
        instance: &str,
        group_jid: &str,
    ) -> Result<Vec<Participant>, PanelError>;
}
