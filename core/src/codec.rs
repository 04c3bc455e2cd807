//! Save-info / save-data codec.
//!
//! Two documents are written per save:
//!   - the info document (SaveInfo): id, scene, dateTime, timePlayed, saveType,
//!     data file name, thumbnail file name
//!   - the data document (SaveData): id, playerData, worldState
//!
//! Both go through StorableCollection and are written as pretty-printed JSON.
//! RULE: Durations are stored as float seconds, timestamps as RFC 3339 strings.

use crate::{
    error::{SaveError, SaveResult},
    storable::{StorableCollection, StorableValue},
    types::{Quat, SaveId, SaveType, Vec3},
};
use chrono::{DateTime, Local};

/// Render a document as pretty JSON.
/// NaN and infinities have no JSON form and are rejected rather than written as null.
pub fn serialize(collection: &StorableCollection) -> SaveResult<String> {
    check_finite_collection(collection, "")?;
    Ok(serde_json::to_string_pretty(collection)?)
}

fn check_finite_collection(collection: &StorableCollection, path: &str) -> SaveResult<()> {
    for (key, value) in collection.iter() {
        let child = if path.is_empty() { key.to_string() } else { format!("{path}.{key}") };
        check_finite(value, &child)?;
    }
    Ok(())
}

fn check_finite(value: &StorableValue, path: &str) -> SaveResult<()> {
    match value {
        StorableValue::Float(f) if !f.is_finite() => Err(SaveError::TypeMismatch {
            key:      path.to_string(),
            expected: "finite float",
            found:    "non-finite float",
        }),
        StorableValue::List(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| check_finite(item, &format!("{path}[{i}]"))),
        StorableValue::Collection(c) => check_finite_collection(c, path),
        _ => Ok(()),
    }
}

/// Parse text into a document tree. The root must be an object.
pub fn deserialize(text: &str) -> SaveResult<StorableCollection> {
    Ok(serde_json::from_str(text)?)
}

impl SaveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal    => "Normal",
            Self::Autosave  => "Autosave",
            Self::NextScene => "NextScene",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Normal"    => Some(Self::Normal),
            "Autosave"  => Some(Self::Autosave),
            "NextScene" => Some(Self::NextScene),
            _ => None,
        }
    }
}

// ── Info document ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SaveInfo {
    pub id:          SaveId,
    pub scene:       String,
    pub date_time:   DateTime<Local>,
    /// Cumulative seconds played.
    pub time_played: f64,
    pub save_type:   SaveType,
    /// File name of the paired data document.
    pub data:        String,
    /// File name of the thumbnail, empty when none was written.
    pub thumbnail:   String,
}

impl SaveInfo {
    pub fn to_storable(&self) -> StorableCollection {
        StorableCollection::new()
            .with("id", self.id.as_str())
            .with("scene", self.scene.as_str())
            .with("dateTime", self.date_time.to_rfc3339())
            .with("timePlayed", self.time_played)
            .with("saveType", self.save_type.as_str())
            .with("data", self.data.as_str())
            .with("thumbnail", self.thumbnail.as_str())
    }

    pub fn from_storable(doc: &StorableCollection) -> SaveResult<Self> {
        let raw_time = doc.get_str("dateTime")?;
        let date_time = DateTime::parse_from_rfc3339(raw_time)
            .map_err(|e| SaveError::TypeMismatch {
                key:      format!("dateTime ({e})"),
                expected: "RFC 3339 timestamp",
                found:    "string",
            })?
            .with_timezone(&Local);

        let raw_type = doc.get_str("saveType")?;
        let save_type = SaveType::parse(raw_type).ok_or_else(|| SaveError::TypeMismatch {
            key:      format!("saveType ({raw_type})"),
            expected: "Normal | Autosave | NextScene",
            found:    "string",
        })?;

        Ok(Self {
            id:          doc.get_str("id")?.to_string(),
            scene:       doc.get_str("scene")?.to_string(),
            date_time,
            time_played: doc.get_f64("timePlayed")?,
            save_type,
            data:        doc.get_str("data")?.to_string(),
            thumbnail:   doc.get_str("thumbnail")?.to_string(),
        })
    }

    pub fn is_autosave(&self) -> bool {
        self.save_type == SaveType::Autosave
    }
}

// ── Data document ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerData {
    pub position:    Vec3,
    pub rotation:    Quat,
    pub local_data:  StorableCollection,
    pub global_data: StorableCollection,
}

impl PlayerData {
    pub fn to_storable(&self) -> StorableCollection {
        StorableCollection::new()
            .with("position", self.position)
            .with("rotation", self.rotation)
            .with("localData", self.local_data.clone())
            .with("globalData", self.global_data.clone())
    }

    pub fn from_storable(doc: &StorableCollection) -> SaveResult<Self> {
        Ok(Self {
            position:    doc.get_vec3("position")?,
            rotation:    doc.get_quat("rotation")?,
            local_data:  doc.get_collection("localData")?.clone(),
            global_data: doc.get_collection("globalData")?.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaveData {
    pub id:                SaveId,
    pub player_data:       PlayerData,
    /// World token → saveable document.
    pub world_saveables:   StorableCollection,
    /// Runtime token → (sub-token → facet document).
    pub runtime_saveables: StorableCollection,
}

impl SaveData {
    pub fn to_storable(&self) -> StorableCollection {
        let world_state = StorableCollection::new()
            .with("worldSaveables", self.world_saveables.clone())
            .with("runtimeSaveables", self.runtime_saveables.clone());

        StorableCollection::new()
            .with("id", self.id.as_str())
            .with("playerData", self.player_data.to_storable())
            .with("worldState", world_state)
    }

    pub fn from_storable(doc: &StorableCollection) -> SaveResult<Self> {
        let world_state = doc.get_collection("worldState")?;
        Ok(Self {
            id:                doc.get_str("id")?.to_string(),
            player_data:       PlayerData::from_storable(doc.get_collection("playerData")?)?,
            world_saveables:   world_state.get_collection("worldSaveables")?.clone(),
            runtime_saveables: world_state.get_collection("runtimeSaveables")?.clone(),
        })
    }
}
