//! Session context: the single pending load request that survives a scene
//! transition but not a process restart.
//!
//! RULES:
//!   - At most one load intent is pending at a time; setting a new one replaces it.
//!   - The scene bootstrap consumes the intent exactly once (take_request).
//!   - An intent that is never consumed expires once the scene that follows it
//!     has been running for the configured TTL. The transition itself, however
//!     long, never counts against it.

use crate::{codec::PlayerData, types::LoadType};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadRequest {
    pub load_type: LoadType,
    /// Scene the request targets.
    pub scene:     Option<String>,
    /// Save folder, only for LoadGameState.
    pub folder:    Option<String>,
}

#[derive(Debug, Default)]
pub struct SessionContext {
    request:        LoadRequest,
    /// Start of the first scene after the intent was armed.
    scene_started:  Option<Instant>,
    carried_player: Option<PlayerData>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn arm(&mut self, load_type: LoadType, scene: &str, folder: Option<&str>) {
        self.request = LoadRequest {
            load_type,
            scene:  Some(scene.to_string()),
            folder: folder.map(str::to_string),
        };
        self.scene_started = None;
        log::debug!("session: armed {load_type:?} for scene {scene}");
    }

    /// Load world and player from `folder` when `scene` starts.
    pub fn set_load_game_state(&mut self, scene: &str, folder: &str) {
        self.arm(LoadType::LoadGameState, scene, Some(folder));
    }

    /// Load `scene`'s world from its last save and carry the player forward.
    pub fn set_load_world_state(&mut self, scene: &str) {
        self.arm(LoadType::LoadWorldState, scene, None);
    }

    /// Start `scene` fresh with the carried player data.
    pub fn set_load_player_data(&mut self, scene: &str) {
        self.arm(LoadType::LoadPlayer, scene, None);
    }

    pub fn load_type(&self) -> LoadType {
        self.request.load_type
    }

    pub fn pending(&self) -> &LoadRequest {
        &self.request
    }

    /// Consume the pending request, leaving Normal behind.
    pub fn take_request(&mut self) -> LoadRequest {
        self.scene_started = None;
        std::mem::take(&mut self.request)
    }

    pub fn clear(&mut self) {
        self.request = LoadRequest::default();
        self.scene_started = None;
    }

    /// Start the TTL clock of a pending intent. Only the first call after
    /// arming counts; later scene starts do not reset it.
    pub fn mark_scene_started(&mut self, now: Instant) {
        if self.request.load_type != LoadType::Normal && self.scene_started.is_none() {
            self.scene_started = Some(now);
        }
    }

    /// Drop an intent whose scene has been running for `ttl`. Returns true if one was dropped.
    pub fn expire_stale(&mut self, now: Instant, ttl: Duration) -> bool {
        match self.scene_started {
            Some(started) if now.saturating_duration_since(started) >= ttl => {
                log::debug!("session: dropping stale {:?} intent", self.request.load_type);
                self.clear();
                true
            }
            _ => false,
        }
    }

    pub fn carry_player(&mut self, player: PlayerData) {
        self.carried_player = Some(player);
    }

    pub fn carried_player(&self) -> Option<&PlayerData> {
        self.carried_player.as_ref()
    }

    pub fn take_carried_player(&mut self) -> Option<PlayerData> {
        self.carried_player.take()
    }
}
