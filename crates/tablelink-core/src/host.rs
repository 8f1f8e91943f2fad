//! Host capability surface.
//!
//! The virtual tabletop owns users, characters, scenes and tokens. This
//! module describes the read-only [`SessionSnapshot`] the bridge consumes,
//! the [`HostEvent`] notifications it reacts to, and the [`Host`] trait a
//! host environment implements. [`MemoryHost`] is a self-contained host
//! used by the demo command and the tests.

use crate::bus::EventBus;
use crate::mapper::{SceneDimensions, TokenRect};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock};

/// The character a user is playing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterInfo {
    pub id: String,
    pub name: String,
}

/// The user running this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    /// Display name shown to other players.
    pub name: String,
    #[serde(default)]
    pub character: Option<CharacterInfo>,
}

/// A token placed on the active scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    /// Character the token represents.
    pub actor_id: String,
    /// Top-left corner in pixels.
    pub x: f32,
    pub y: f32,
    /// Size in grid cells.
    #[serde(default = "one")]
    pub width: f32,
    #[serde(default = "one")]
    pub height: f32,
    /// Clockwise rotation in degrees.
    #[serde(default)]
    pub rotation: f32,
}

fn one() -> f32 {
    1.0
}

impl TokenInfo {
    pub fn rect(&self) -> TokenRect {
        TokenRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// The scene currently shown on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneInfo {
    pub id: String,
    pub name: String,
    /// Grid cell size in pixels.
    pub grid_size: f32,
    /// Scene size in pixels.
    pub width: f32,
    pub height: f32,
}

impl SceneInfo {
    pub fn dimensions(&self) -> SceneDimensions {
        SceneDimensions {
            width: self.width,
            height: self.height,
            grid_size: self.grid_size,
        }
    }
}

/// Read-only view of the host state taken for one update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Title of the game world.
    #[serde(default)]
    pub world: Option<String>,
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(default)]
    pub scene: Option<SceneInfo>,
    /// Tokens on the active scene.
    #[serde(default)]
    pub tokens: Vec<TokenInfo>,
}

impl SessionSnapshot {
    /// The character controlled by the active user, if any.
    pub fn active_character(&self) -> Option<&CharacterInfo> {
        self.user.as_ref()?.character.as_ref()
    }

    /// The active character's token on the active scene.
    ///
    /// A character may have several tokens; the first one is used.
    pub fn active_token(&self) -> Option<&TokenInfo> {
        let character = self.active_character()?;
        self.tokens.iter().find(|t| t.actor_id == character.id)
    }
}

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// Lifecycle and state-change notifications published by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A token moved, rotated or was resized.
    TokenUpdated {
        token_id: String,
        actor_id: Option<String>,
    },
    /// The canvas finished drawing a scene.
    CanvasReady { scene_id: String },
    /// A user's data changed.
    UserUpdated {
        user_id: String,
        character_changed: bool,
    },
    /// The local user signed out.
    SignOut,
}

/// Discriminant of [`HostEvent`] used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    TokenUpdated,
    CanvasReady,
    UserUpdated,
    SignOut,
}

impl HostEvent {
    pub fn kind(&self) -> HostEventKind {
        match self {
            HostEvent::TokenUpdated { .. } => HostEventKind::TokenUpdated,
            HostEvent::CanvasReady { .. } => HostEventKind::CanvasReady,
            HostEvent::UserUpdated { .. } => HostEventKind::UserUpdated,
            HostEvent::SignOut => HostEventKind::SignOut,
        }
    }
}

/// Capabilities the bridge needs from the host environment.
pub trait Host: Send + Sync {
    /// Take a snapshot of the current session state.
    fn snapshot(&self) -> SessionSnapshot;

    /// Show a notification to the user.
    fn notify(&self, level: NotifyLevel, message: &str);
}

/// In-process host backed by a shared [`SessionSnapshot`].
///
/// Mutators update the snapshot and publish the matching [`HostEvent`] on
/// the bus, the way a real host fires its hooks after a change.
#[derive(Clone)]
pub struct MemoryHost {
    state: Arc<RwLock<SessionSnapshot>>,
    bus: EventBus,
    notifications: Arc<Mutex<Vec<(NotifyLevel, String)>>>,
}

impl MemoryHost {
    /// Create a host with an initial snapshot publishing on `bus`.
    pub fn new(snapshot: SessionSnapshot, bus: EventBus) -> Self {
        Self {
            state: Arc::new(RwLock::new(snapshot)),
            bus,
            notifications: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The bus this host publishes on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Read the state with a closure.
    pub fn with_state_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionSnapshot) -> R,
    {
        let state = self.state.read().expect("Host state lock poisoned");
        f(&state)
    }

    /// Write to the state with a closure. No event is published.
    pub fn with_state_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut SessionSnapshot) -> R,
    {
        let mut state = self.state.write().expect("Host state lock poisoned");
        f(&mut state)
    }

    /// Move and rotate a token, then publish `TokenUpdated`.
    ///
    /// Returns false if no token has this id.
    pub fn move_token(&self, token_id: &str, x: f32, y: f32, rotation: f32) -> bool {
        let actor_id = self.with_state_write(|s| {
            s.tokens.iter_mut().find(|t| t.id == token_id).map(|token| {
                token.x = x;
                token.y = y;
                token.rotation = rotation;
                token.actor_id.clone()
            })
        });

        match actor_id {
            Some(actor_id) => {
                self.bus.publish(HostEvent::TokenUpdated {
                    token_id: token_id.to_string(),
                    actor_id: Some(actor_id),
                });
                true
            }
            None => false,
        }
    }

    /// Activate a scene with its tokens, then publish `CanvasReady`.
    pub fn set_scene(&self, scene: SceneInfo, tokens: Vec<TokenInfo>) {
        let scene_id = scene.id.clone();
        self.with_state_write(|s| {
            s.scene = Some(scene);
            s.tokens = tokens;
        });
        self.bus.publish(HostEvent::CanvasReady { scene_id });
    }

    /// Change the active user's character, then publish `UserUpdated`.
    pub fn set_character(&self, character: Option<CharacterInfo>) {
        let changed = self.with_state_write(|s| {
            s.user.as_mut().map(|user| {
                let changed = user.character != character;
                user.character = character;
                (user.id.clone(), changed)
            })
        });

        if let Some((user_id, character_changed)) = changed {
            self.bus.publish(HostEvent::UserUpdated {
                user_id,
                character_changed,
            });
        }
    }

    /// Change the active user's display name, then publish `UserUpdated`.
    pub fn rename_user(&self, name: &str) {
        let user_id = self.with_state_write(|s| {
            s.user.as_mut().map(|user| {
                user.name = name.to_string();
                user.id.clone()
            })
        });

        if let Some(user_id) = user_id {
            self.bus.publish(HostEvent::UserUpdated {
                user_id,
                character_changed: false,
            });
        }
    }

    /// Publish `SignOut`.
    pub fn sign_out(&self) {
        self.bus.publish(HostEvent::SignOut);
    }

    /// Notifications shown so far.
    pub fn notifications(&self) -> Vec<(NotifyLevel, String)> {
        self.notifications
            .lock()
            .expect("Notification lock poisoned")
            .clone()
    }
}

impl Host for MemoryHost {
    fn snapshot(&self) -> SessionSnapshot {
        self.with_state_read(|s| s.clone())
    }

    fn notify(&self, level: NotifyLevel, message: &str) {
        log::info!("[HOST] Notification ({:?}): {}", level, message);
        self.notifications
            .lock()
            .expect("Notification lock poisoned")
            .push((level, message.to_string()));
    }
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHost")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fixtures;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_active_token_follows_character() {
        let snapshot = fixtures::snapshot();
        assert_eq!(snapshot.active_token().map(|t| t.id.as_str()), Some("token-1"));

        let mut without_character = snapshot.clone();
        without_character.user.as_mut().unwrap().character = None;
        assert!(without_character.active_token().is_none());

        let mut without_user = snapshot;
        without_user.user = None;
        assert!(without_user.active_character().is_none());
    }

    #[test]
    fn test_move_token_publishes_event() {
        let bus = EventBus::new();
        let (tx, rx) = unbounded();
        bus.subscribe(HostEventKind::TokenUpdated, tx);
        let host = MemoryHost::new(fixtures::snapshot(), bus);

        assert!(host.move_token("token-1", 300.0, 400.0, 90.0));
        assert!(!host.move_token("missing", 0.0, 0.0, 0.0));

        let event = rx.try_recv().unwrap();
        assert_eq!(
            event,
            HostEvent::TokenUpdated {
                token_id: "token-1".to_string(),
                actor_id: Some("actor-1".to_string()),
            }
        );
        assert!(rx.try_recv().is_err());

        let token = host.snapshot().active_token().cloned().unwrap();
        assert_eq!((token.x, token.y, token.rotation), (300.0, 400.0, 90.0));
    }

    #[test]
    fn test_set_character_reports_change() {
        let bus = EventBus::new();
        let (tx, rx) = unbounded();
        bus.subscribe(HostEventKind::UserUpdated, tx);
        let host = MemoryHost::new(fixtures::snapshot(), bus);

        host.rename_user("Alicia");
        host.set_character(None);

        assert_eq!(
            rx.try_recv().unwrap(),
            HostEvent::UserUpdated {
                user_id: "user-1".to_string(),
                character_changed: false,
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            HostEvent::UserUpdated {
                user_id: "user-1".to_string(),
                character_changed: true,
            }
        );
    }

    #[test]
    fn test_notifications_are_recorded() {
        let host = MemoryHost::new(SessionSnapshot::default(), EventBus::new());
        host.notify(NotifyLevel::Warning, "relay missing");
        assert_eq!(
            host.notifications(),
            vec![(NotifyLevel::Warning, "relay missing".to_string())]
        );
    }

    #[test]
    fn test_snapshot_from_toml() {
        let snapshot: SessionSnapshot = toml::from_str(
            r#"
world = "Greyhawk"

[user]
id = "u"
name = "Alice"
character = { id = "a", name = "Hero" }

[scene]
id = "s"
name = "Tavern"
grid_size = 100.0
width = 1000.0
height = 1000.0

[[tokens]]
id = "t"
actor_id = "a"
x = 100.0
y = 100.0
"#,
        )
        .unwrap();
        let token = snapshot.active_token().unwrap();
        assert_eq!(token.width, 1.0);
        assert_eq!(token.rotation, 0.0);
    }
}
