use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// What a dispatch job sends.
///
/// On the wire the media kind is spelled `"image"`, matching the panel's request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "image")]
    Media,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Media => "media",
        }
    }
}

/// Payload of a single dispatch. Text carries its body; media carries the image
/// reference (URL, raw base64, or data-URI) and a caption that may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobContent {
    Text { body: String },
    Media { media: String, caption: String },
}

impl JobContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Media { .. } => MessageKind::Media,
        }
    }
}

/// One message to one recipient inside the bulk queue.
///
/// Immutable once built: every field is private and only exposed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchJob {
    id: Uuid,
    instance_ref: String,
    recipient: String,
    content: JobContent,
    delay_after: Duration,
}

impl DispatchJob {
    pub fn new(
        instance_ref: impl Into<String>,
        recipient: impl Into<String>,
        content: JobContent,
        delay_after: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instance_ref: instance_ref.into(),
            recipient: recipient.into(),
            content,
            delay_after,
        }
    }

    /// Correlation id, only used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Provider-side instance reference shared by every job of a batch.
    pub fn instance_ref(&self) -> &str {
        &self.instance_ref
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn content(&self) -> &JobContent {
        &self.content
    }

    pub fn kind(&self) -> MessageKind {
        self.content.kind()
    }

    /// Pause after this job before the next one is dispatched. Zero means "use the default".
    pub fn delay_after(&self) -> Duration {
        self.delay_after
    }
}

/// Raw provider response for a successful send, passed back to single-target callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryReceipt(pub Value);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(serde_json::to_string(&MessageKind::Text).unwrap(), "\"text\"");
        assert_eq!(serde_json::to_string(&MessageKind::Media).unwrap(), "\"image\"");
        let kind: MessageKind = serde_json::from_str("\"image\"").unwrap();
        assert_eq!(kind, MessageKind::Media);
        assert!(serde_json::from_str::<MessageKind>("\"video\"").is_err());
    }

    #[test]
    fn test_job_accessors() {
        let job = DispatchJob::new(
            "evo-1",
            "5511999990000",
            JobContent::Media {
                media: "https://example.com/a.jpg".into(),
                caption: "hello".into(),
            },
            Duration::from_millis(5000),
        );
        assert_eq!(job.instance_ref(), "evo-1");
        assert_eq!(job.recipient(), "5511999990000");
        assert_eq!(job.kind(), MessageKind::Media);
        assert_eq!(job.kind().as_str(), "media");
        assert_eq!(job.delay_after(), Duration::from_secs(5));
    }

    #[test]
    fn test_jobs_get_distinct_ids() {
        let content = JobContent::Text { body: "oi".into() };
        let a = DispatchJob::new("evo", "1", content.clone(), Duration::ZERO);
        let b = DispatchJob::new("evo", "1", content, Duration::ZERO);
        assert_ne!(a.id(), b.id());
    }
}
