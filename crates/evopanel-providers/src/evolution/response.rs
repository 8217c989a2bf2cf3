//! Evolution API response shapes.
//!
//! The same endpoint may answer with a bare array or a wrapped object, and
//! identifiers show up under different field names depending on the server
//! version. Each shape is an explicit union with a fixed fallback order.

use evopanel_core::instance::{GroupInfo, Participant};
use evopanel_core::phone::phone_from_jid;
use serde::Deserialize;
use serde_json::Value;

/// An identifier that may arrive as a string, a number, or `{ "_serialized": "..." }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdField {
    Plain(String),
    Number(serde_json::Number),
    Serialized {
        #[serde(rename = "_serialized")]
        serialized: String,
    },
}

impl IdField {
    fn as_string(&self) -> String {
        match self {
            Self::Plain(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Serialized { serialized } => serialized.clone(),
        }
    }
}

/// First candidate that is present and non-empty.
fn first_id(candidates: &[&Option<IdField>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| c.as_ref().map(IdField::as_string))
        .find(|s| !s.is_empty())
}

fn first_text(candidates: &[&Option<String>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// POST /instance/create
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedInner {
    id: Option<IdField>,
    instance_name: Option<IdField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateResponse {
    instance: Option<CreatedInner>,
    instance_id: Option<IdField>,
    id: Option<IdField>,
}

impl CreateResponse {
    /// Fallback order: `instance.id`, `instance.instanceName`, `instanceId`, `id`.
    pub(crate) fn instance_ref(&self) -> Option<String> {
        let (inner_id, inner_name) = match &self.instance {
            Some(inner) => (&inner.id, &inner.instance_name),
            None => (&None, &None),
        };
        first_id(&[inner_id, inner_name, &self.instance_id, &self.id])
    }
}

// ---------------------------------------------------------------------------
// GET /instance/connectionState/{instance}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StateInner {
    state: Option<IdField>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StateResponse {
    instance: Option<StateInner>,
}

impl StateResponse {
    pub(crate) fn state(&self) -> Option<String> {
        self.instance
            .as_ref()
            .and_then(|i| i.state.as_ref())
            .map(|s| s.as_string().to_lowercase())
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// GET /group/fetchAllGroups/{instance}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawGroup {
    id: Option<IdField>,
    jid: Option<IdField>,
    group_id: Option<IdField>,
    remote_jid: Option<IdField>,
    name: Option<String>,
    subject: Option<String>,
    group_name: Option<String>,
    title: Option<String>,
}

impl RawGroup {
    fn into_group(self) -> Option<GroupInfo> {
        let jid = first_id(&[&self.id, &self.jid, &self.group_id, &self.remote_jid])?;
        let name = first_text(&[&self.name, &self.subject, &self.group_name, &self.title])?;
        Some(GroupInfo { jid, name })
    }
}

/// `{ "groups": [...] }` first, then a bare array, then anything else (no groups).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum GroupsResponse {
    Wrapped { groups: Vec<RawGroup> },
    Bare(Vec<RawGroup>),
    Unknown(Value),
}

impl GroupsResponse {
    /// Entries without a jid or a name are dropped.
    pub(crate) fn into_groups(self) -> Vec<GroupInfo> {
        let raw = match self {
            Self::Wrapped { groups } => groups,
            Self::Bare(groups) => groups,
            Self::Unknown(v) => {
                tracing::warn!("evolution: unrecognized groups response: {v}");
                Vec::new()
            }
        };
        raw.into_iter().filter_map(RawGroup::into_group).collect()
    }
}

// ---------------------------------------------------------------------------
// GET /group/participants/{instance}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawParticipant {
    id: Option<IdField>,
    wid: Option<IdField>,
    number: Option<IdField>,
    phone: Option<IdField>,
    jid: Option<IdField>,
    name: Option<String>,
    push_name: Option<String>,
    notify: Option<String>,
    short_name: Option<String>,
}

impl RawParticipant {
    fn into_participant(self) -> Option<Participant> {
        let raw_id = first_id(&[&self.id, &self.wid, &self.number, &self.phone, &self.jid])?;
        let phone = phone_from_jid(&raw_id)?;
        let name = first_text(&[&self.name, &self.push_name, &self.notify, &self.short_name]);
        Some(Participant { phone, name })
    }
}

/// A bare array first, then `{ "participants": [...] }`, then anything else (nobody).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ParticipantsResponse {
    Bare(Vec<RawParticipant>),
    Wrapped { participants: Vec<RawParticipant> },
    Unknown(Value),
}

impl ParticipantsResponse {
    /// Entries whose identifier carries no digits are dropped.
    pub(crate) fn into_participants(self) -> Vec<Participant> {
        let raw = match self {
            Self::Bare(list) => list,
            Self::Wrapped { participants } => participants,
            Self::Unknown(v) => {
                tracing::warn!("evolution: unrecognized participants response: {v}");
                Vec::new()
            }
        };
        raw.into_iter()
            .filter_map(RawParticipant::into_participant)
            .collect()
    }
}
