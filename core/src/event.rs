//! Save/load notifications published by the manager.
//!
//! RULE: The core never drives UI directly. A "saving" indicator subscribes to
//! SaveStarted and SaveCompleted/SaveFailed and owns its own timing.

use crate::types::{LoadType, SaveId, SaveType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaveEvent {
    SaveStarted {
        folder:    String,
        save_type: SaveType,
    },
    SaveCompleted {
        folder: String,
        id:     SaveId,
    },
    SaveFailed {
        folder: String,
        reason: String,
    },
    LoadCompleted {
        scene:     String,
        load_type: LoadType,
    },
}

pub type EventListener = Box<dyn Fn(&SaveEvent) + Send + Sync>;
