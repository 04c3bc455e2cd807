//! Per-project persistence configuration.
//!
//! Loaded from a JSON file; every field has a default so a partial file
//! (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    pub data_root:                  PathBuf,
    pub saves_folder:               String,
    pub save_folder_prefix:         String,
    pub save_info_name:             String,
    pub save_data_name:             String,
    pub save_thumbnail_name:        String,
    pub save_extension:             String,
    pub config_folder:              String,
    pub inputs_filename:            String,
    pub options_filename:           String,
    pub options_extension:          String,
    pub encrypt_saves:              bool,
    pub encryption_key:             String,
    /// Reuse one folder instead of creating a new one per save.
    pub single_save:                bool,
    /// With single_save: name the folder after the scene.
    pub use_scene_names:            bool,
    /// With single_save: one folder per distinct scene saved this session.
    pub previous_scene_persistency: bool,
    pub create_thumbnails:          bool,
    /// Seconds after scene start before a pending load intent is discarded.
    pub load_intent_ttl_secs:       u64,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            data_root:                  PathBuf::from("."),
            saves_folder:               "Saves".into(),
            save_folder_prefix:         "Save".into(),
            save_info_name:             "SaveInfo".into(),
            save_data_name:             "SaveData".into(),
            save_thumbnail_name:        "Thumbnail".into(),
            save_extension:             ".sav".into(),
            config_folder:              "Config".into(),
            inputs_filename:            "Inputs".into(),
            options_filename:           "Options".into(),
            options_extension:          ".json".into(),
            encrypt_saves:              false,
            encryption_key:             String::new(),
            single_save:                false,
            use_scene_names:            false,
            previous_scene_persistency: false,
            create_thumbnails:          true,
            load_intent_ttl_secs:       5,
        }
    }
}

impl SaveConfig {
    /// Load the config from a JSON file and normalise it.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
        let config: SaveConfig = serde_json::from_str(&content)?;
        Ok(config.normalized())
    }

    /// Config rooted at `data_root` with every other field defaulted.
    pub fn with_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Extensions always start with '.'.
    pub fn normalized(mut self) -> Self {
        self.save_extension = normalize_extension(&self.save_extension);
        self.options_extension = normalize_extension(&self.options_extension);
        self
    }

    pub fn saves_root(&self) -> PathBuf {
        self.data_root.join(&self.saves_folder)
    }

    pub fn save_folder(&self, folder_name: &str) -> PathBuf {
        self.saves_root().join(folder_name)
    }

    pub fn info_file_name(&self) -> String {
        format!("{}{}", self.save_info_name, normalize_extension(&self.save_extension))
    }

    pub fn data_file_name(&self) -> String {
        format!("{}{}", self.save_data_name, normalize_extension(&self.save_extension))
    }

    /// Thumbnails are always plain PNG.
    pub fn thumbnail_file_name(&self) -> String {
        format!("{}.png", self.save_thumbnail_name)
    }

    pub fn config_root(&self) -> PathBuf {
        self.data_root.join(&self.config_folder)
    }

    pub fn inputs_path(&self) -> PathBuf {
        self.config_root().join(format!("{}.xml", self.inputs_filename))
    }

    pub fn options_path(&self) -> PathBuf {
        self.config_root().join(format!(
            "{}{}",
            self.options_filename,
            normalize_extension(&self.options_extension)
        ))
    }
}

pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_gets_leading_dot() {
        assert_eq!(normalize_extension("sav"), ".sav");
        assert_eq!(normalize_extension(".sav"), ".sav");
        assert_eq!(normalize_extension(""), "");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SaveConfig =
            serde_json::from_str(r#"{ "save_extension": "dat", "single_save": true }"#).unwrap();
        let config = config.normalized();
        assert_eq!(config.save_extension, ".dat");
        assert!(config.single_save);
        assert_eq!(config.save_folder_prefix, "Save");
        assert_eq!(config.info_file_name(), "SaveInfo.dat");
    }

    #[test]
    fn layout_paths() {
        let config = SaveConfig::with_root("/game");
        assert_eq!(config.save_folder("Save000"), PathBuf::from("/game/Saves/Save000"));
        assert_eq!(config.thumbnail_file_name(), "Thumbnail.png");
        assert_eq!(config.inputs_path(), PathBuf::from("/game/Config/Inputs.xml"));
        assert_eq!(config.options_path(), PathBuf::from("/game/Config/Options.json"));
    }
}
