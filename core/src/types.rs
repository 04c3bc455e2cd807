//! Shared primitive types used across the persistence core.

use serde::{Deserialize, Serialize};

/// A stable string key binding a live saveable to its slot in a document.
pub type Token = String;

/// The fresh identifier written into both documents of one save.
pub type SaveId = String;

/// Reference GUID of a spawnable object in the reference catalog.
pub type ReferenceGuid = String;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quat {
    fn default() -> Self { Self::IDENTITY }
}

/// How a save was triggered. Persisted in the info document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveType {
    Normal,
    Autosave,
    NextScene,
}

/// The pending load intent carried across a scene transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadType {
    /// Fresh scene start, nothing is loaded.
    #[default]
    Normal,
    /// Load world and player state from a named save folder.
    LoadGameState,
    /// Load the current scene's world state from its last save, carry the player forward.
    LoadWorldState,
    /// Load only the carried player data into a fresh scene.
    LoadPlayer,
}
