//! Link records and the JSON wire format.
//!
//! A [`LinkRecord`] is the complete positional state for one tick. What
//! travels over the wire is a [`LinkUpdate`]: the same fields, each
//! optional, so event-driven updates can carry only what changed and the
//! consumer merges them into its current state.

use crate::error::Result;
use crate::mapper::AudioPose;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Maximum number of context bytes the consumer accepts.
pub const CONTEXT_CAPACITY: usize = 256;

/// Link protocol version written by the relay.
pub const LINK_VERSION: u32 = 2;

/// Complete link state, rebuilt from scratch on every update.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub avatar_position: Vec3,
    pub avatar_front: Vec3,
    pub avatar_top: Vec3,
    pub name: String,
    pub camera_position: Vec3,
    pub camera_front: Vec3,
    pub camera_top: Vec3,
    /// JSON-encoded [`Identity`].
    pub identity: String,
    /// JSON-encoded [`LinkContext`], at most [`CONTEXT_CAPACITY`] bytes.
    pub context: Vec<u8>,
    /// Always equal to `context.len()`.
    pub context_len: u32,
    pub description: String,
}

impl LinkRecord {
    /// Assemble a record from an avatar pose. The camera mirrors the avatar.
    pub fn new(
        pose: AudioPose,
        name: impl Into<String>,
        identity: impl Into<String>,
        context: Vec<u8>,
        description: impl Into<String>,
    ) -> Self {
        let context = clamp_context(context);
        Self {
            avatar_position: pose.position,
            avatar_front: pose.front,
            avatar_top: pose.top,
            name: name.into(),
            camera_position: pose.position,
            camera_front: pose.front,
            camera_top: pose.top,
            identity: identity.into(),
            context_len: context.len() as u32,
            context,
            description: description.into(),
        }
    }
}

/// Partial link record as pushed to the consumer.
///
/// Absent fields are omitted from the JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkUpdate {
    #[serde(rename = "uiVersion", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(rename = "fAvatarPosition", default, skip_serializing_if = "Option::is_none")]
    pub avatar_position: Option<Vec3>,
    #[serde(rename = "fAvatarFront", default, skip_serializing_if = "Option::is_none")]
    pub avatar_front: Option<Vec3>,
    #[serde(rename = "fAvatarTop", default, skip_serializing_if = "Option::is_none")]
    pub avatar_top: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "fCameraPosition", default, skip_serializing_if = "Option::is_none")]
    pub camera_position: Option<Vec3>,
    #[serde(rename = "fCameraFront", default, skip_serializing_if = "Option::is_none")]
    pub camera_front: Option<Vec3>,
    #[serde(rename = "fCameraTop", default, skip_serializing_if = "Option::is_none")]
    pub camera_top: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<u8>>,
    #[serde(rename = "context_len", default, skip_serializing_if = "Option::is_none")]
    pub context_len: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LinkUpdate {
    /// Update carrying only the context blob and its length.
    pub fn context(bytes: Vec<u8>) -> Self {
        let bytes = clamp_context(bytes);
        Self {
            context_len: Some(bytes.len() as u32),
            context: Some(bytes),
            ..Default::default()
        }
    }

    /// Update carrying only the identity string.
    pub fn identity(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            ..Default::default()
        }
    }

    /// Overlay the fields present in `other` onto this update.
    pub fn merge(mut self, other: LinkUpdate) -> Self {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        overlay!(
            version,
            avatar_position,
            avatar_front,
            avatar_top,
            name,
            camera_position,
            camera_front,
            camera_top,
            identity,
            context,
            context_len,
            description
        );
        self
    }

    /// Check whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an update received from the wire.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl From<LinkRecord> for LinkUpdate {
    fn from(record: LinkRecord) -> Self {
        Self {
            version: Some(LINK_VERSION),
            avatar_position: Some(record.avatar_position),
            avatar_front: Some(record.avatar_front),
            avatar_top: Some(record.avatar_top),
            name: Some(record.name),
            camera_position: Some(record.camera_position),
            camera_front: Some(record.camera_front),
            camera_top: Some(record.camera_top),
            identity: Some(record.identity),
            context: Some(record.context),
            context_len: Some(record.context_len),
            description: Some(record.description),
        }
    }
}

/// Descriptive identity of the local player, sent as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    pub name: String,
    pub world: String,
    pub scene: String,
    pub character: String,
}

impl Identity {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Grouping key: players in the same world and scene hear each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkContext {
    pub world: String,
    pub scene: String,
}

impl LinkContext {
    /// JSON bytes, truncated to [`CONTEXT_CAPACITY`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(clamp_context(serde_json::to_vec(self)?))
    }
}

fn clamp_context(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.truncate(CONTEXT_CAPACITY);
    bytes
}
