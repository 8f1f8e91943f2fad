//! Assembles link records from host snapshots.
//!
//! Every build starts from the snapshot alone, so the periodic and the
//! event-driven paths can run in any order.

use crate::host::SessionSnapshot;
use crate::mapper;
use crate::record::{Identity, LinkContext, LinkRecord, LinkUpdate};
use crate::settings::Settings;

/// Scene label used in the identity when no scene is active.
pub const UNKNOWN_SCENE: &str = "Unknown";
/// Character label used in the identity when no character is assigned.
pub const NO_CHARACTER: &str = "No Character";
/// World label used when the world title is unavailable.
pub const UNKNOWN_WORLD: &str = "Unknown";
/// Fallback for world and scene in the context blob.
pub const NO_CONTEXT: &str = "none";

/// Builds full and partial link updates from a [`SessionSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkStateBuilder {
    enabled: bool,
    scale_multiplier: f32,
}

impl LinkStateBuilder {
    pub fn new(settings: &Settings) -> Self {
        Self {
            enabled: settings.enabled,
            scale_multiplier: settings.scale_multiplier,
        }
    }

    /// Build the complete record for the active token.
    ///
    /// Returns `None` when forwarding is disabled or the user has no
    /// character, token or scene. Those are normal states, not errors.
    pub fn build(&self, snapshot: &SessionSnapshot) -> Option<LinkRecord> {
        if !self.enabled {
            return None;
        }
        let Some(user) = snapshot.user.as_ref() else {
            log::trace!("[BUILDER] No active user, skipping");
            return None;
        };
        let Some(token) = snapshot.active_token() else {
            log::trace!("[BUILDER] No active token for {}, skipping", user.name);
            return None;
        };
        let Some(scene) = snapshot.scene.as_ref() else {
            log::trace!("[BUILDER] No active scene, skipping");
            return None;
        };

        let pose = mapper::map(
            &token.rect(),
            &scene.dimensions(),
            token.rotation,
            self.scale_multiplier,
        );

        let identity = encode_or_log("identity", self.identity(snapshot)?.to_json())?;
        let context = encode_or_log("context", self.context(snapshot).to_bytes())?;

        Some(LinkRecord::new(
            pose,
            user.name.as_str(),
            identity,
            context,
            self.description(snapshot),
        ))
    }

    /// Build an update carrying only the context blob.
    pub fn build_context_update(&self, snapshot: &SessionSnapshot) -> Option<LinkUpdate> {
        if !self.enabled {
            return None;
        }
        let bytes = encode_or_log("context", self.context(snapshot).to_bytes())?;
        Some(LinkUpdate::context(bytes))
    }

    /// Build an update carrying only the identity string.
    pub fn build_identity_update(&self, snapshot: &SessionSnapshot) -> Option<LinkUpdate> {
        if !self.enabled {
            return None;
        }
        let identity = encode_or_log("identity", self.identity(snapshot)?.to_json())?;
        Some(LinkUpdate::identity(identity))
    }

    /// Identity of the active user, or `None` without a user.
    pub fn identity(&self, snapshot: &SessionSnapshot) -> Option<Identity> {
        let user = snapshot.user.as_ref()?;
        Some(Identity {
            name: user.name.clone(),
            world: snapshot
                .world
                .clone()
                .unwrap_or_else(|| UNKNOWN_WORLD.to_string()),
            scene: snapshot
                .scene
                .as_ref()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| UNKNOWN_SCENE.to_string()),
            character: snapshot
                .active_character()
                .map(|c| c.name.clone())
                .unwrap_or_else(|| NO_CHARACTER.to_string()),
        })
    }

    /// Context grouping players by world and scene id.
    pub fn context(&self, snapshot: &SessionSnapshot) -> LinkContext {
        LinkContext {
            world: snapshot
                .world
                .clone()
                .unwrap_or_else(|| NO_CONTEXT.to_string()),
            scene: snapshot
                .scene
                .as_ref()
                .map(|s| s.id.clone())
                .unwrap_or_else(|| NO_CONTEXT.to_string()),
        }
    }

    fn description(&self, snapshot: &SessionSnapshot) -> String {
        let world = snapshot.world.as_deref().unwrap_or(UNKNOWN_WORLD);
        let scene = snapshot
            .scene
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or(UNKNOWN_SCENE);
        format!("{} - {}", world, scene)
    }
}

fn encode_or_log<T>(what: &str, result: crate::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::error!("[BUILDER] Failed to encode {}: {}", what, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fixtures;
    use glam::Vec3;

    fn builder() -> LinkStateBuilder {
        LinkStateBuilder::new(&Settings::default())
    }

    #[test]
    fn test_build_full_record() {
        let record = builder().build(&fixtures::snapshot()).unwrap();
        assert!(record
            .avatar_position
            .abs_diff_eq(Vec3::new(-35.0, 0.0, -35.0), 1e-4));
        assert!(record.avatar_front.abs_diff_eq(Vec3::Z, 1e-4));
        assert_eq!(record.avatar_top, Vec3::Y);
        assert_eq!(record.camera_position, record.avatar_position);
        assert_eq!(record.name, "Alice");
        assert_eq!(record.description, "Greyhawk - Tavern");
        assert_eq!(record.context_len as usize, record.context.len());
    }

    #[test]
    fn test_build_skips_when_disabled() {
        let settings = Settings {
            enabled: false,
            ..Default::default()
        };
        let builder = LinkStateBuilder::new(&settings);
        let snapshot = fixtures::snapshot();
        assert!(builder.build(&snapshot).is_none());
        assert!(builder.build_context_update(&snapshot).is_none());
        assert!(builder.build_identity_update(&snapshot).is_none());
    }

    #[test]
    fn test_build_skips_without_token() {
        let mut snapshot = fixtures::snapshot();
        snapshot.tokens.retain(|t| t.actor_id != "actor-1");
        assert!(builder().build(&snapshot).is_none());

        let mut snapshot = fixtures::snapshot();
        snapshot.user.as_mut().unwrap().character = None;
        assert!(builder().build(&snapshot).is_none());
    }

    #[test]
    fn test_build_skips_without_scene() {
        let mut snapshot = fixtures::snapshot();
        snapshot.scene = None;
        assert!(builder().build(&snapshot).is_none());
    }

    #[test]
    fn test_identity_decodes_to_exact_fields() {
        let record = builder().build(&fixtures::snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&record.identity).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["character", "name", "scene", "world"]);

        let identity: Identity = serde_json::from_str(&record.identity).unwrap();
        assert_eq!(
            identity,
            Identity {
                name: "Alice".to_string(),
                world: "Greyhawk".to_string(),
                scene: "Tavern".to_string(),
                character: "Hero".to_string(),
            }
        );
    }

    #[test]
    fn test_identity_fallbacks() {
        let mut snapshot = fixtures::snapshot();
        snapshot.scene = None;
        snapshot.user.as_mut().unwrap().character = None;

        let update = builder().build_identity_update(&snapshot).unwrap();
        let identity: Identity = serde_json::from_str(update.identity.as_deref().unwrap()).unwrap();
        assert_eq!(identity.scene, UNKNOWN_SCENE);
        assert_eq!(identity.character, NO_CHARACTER);
        assert_eq!(identity.name, "Alice");
        assert!(update.avatar_position.is_none());
    }

    #[test]
    fn test_identity_requires_user() {
        let snapshot = crate::host::SessionSnapshot::default();
        assert!(builder().build_identity_update(&snapshot).is_none());
    }

    #[test]
    fn test_context_fallbacks() {
        let update = builder()
            .build_context_update(&crate::host::SessionSnapshot::default())
            .unwrap();
        let bytes = update.context.unwrap();
        assert_eq!(update.context_len, Some(bytes.len() as u32));
        let context: LinkContext = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(context.world, NO_CONTEXT);
        assert_eq!(context.scene, NO_CONTEXT);
        assert!(update.identity.is_none());
    }

    #[test]
    fn test_context_groups_by_world_and_scene_id() {
        let record = builder().build(&fixtures::snapshot()).unwrap();
        let context: LinkContext = serde_json::from_slice(&record.context).unwrap();
        assert_eq!(
            context,
            LinkContext {
                world: "Greyhawk".to_string(),
                scene: "scene-1".to_string(),
            }
        );
    }

    #[test]
    fn test_context_length_matches_for_long_names() {
        let mut snapshot = fixtures::snapshot();
        snapshot.world = Some("w".repeat(500));
        let record = builder().build(&snapshot).unwrap();
        assert_eq!(record.context.len(), crate::record::CONTEXT_CAPACITY);
        assert_eq!(record.context_len as usize, record.context.len());
    }

    #[test]
    fn test_scale_multiplier_is_applied() {
        let settings = Settings {
            scale_multiplier: 1.0,
            ..Default::default()
        };
        let record = LinkStateBuilder::new(&settings)
            .build(&fixtures::snapshot())
            .unwrap();
        assert!(record
            .avatar_position
            .abs_diff_eq(Vec3::new(-350.0, 0.0, -350.0), 1e-3));
    }
}
