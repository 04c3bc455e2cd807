//! Save directory reader: enumerates save folders and reads their info documents.
//!
//! Layout:
//!   <data_root>/<saves_folder>/<prefix><index-or-name>/
//!       <info><ext>       info document (maybe encrypted)
//!       <data><ext>       data document (maybe encrypted)
//!       <thumbnail>.png   optional, never encrypted
//!
//! RULE: A folder that cannot be decrypted or parsed is skipped by the bulk
//! readers. It never produces a partial summary.

use crate::{
    codec::{SaveData, SaveInfo},
    config::SaveConfig,
    crypto::Encryptor,
    error::{SaveError, SaveResult},
    storage,
    types::{SaveId, SaveType},
};
use chrono::{DateTime, Local};
use image::RgbaImage;
use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;

/// One row of a save browser.
#[derive(Debug, Clone, Default)]
pub struct SaveSummary {
    pub folder_name: String,
    pub id:          SaveId,
    pub scene:       String,
    pub date_time:   Option<DateTime<Local>>,
    pub time_played: f64,
    pub save_type:   Option<SaveType>,
    pub is_autosave: bool,
    pub thumbnail:   Option<RgbaImage>,
}

impl SaveSummary {
    fn from_info(folder_name: &str, info: SaveInfo) -> Self {
        Self {
            folder_name: folder_name.to_string(),
            is_autosave: info.is_autosave(),
            save_type:   Some(info.save_type),
            id:          info.id,
            scene:       info.scene,
            date_time:   Some(info.date_time),
            time_played: info.time_played,
            thumbnail:   None,
        }
    }

    /// True for the default summary returned when a folder does not exist.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

pub struct SaveDirectoryReader {
    config:    SaveConfig,
    encryptor: Encryptor,
}

impl SaveDirectoryReader {
    pub fn new(config: SaveConfig) -> SaveResult<Self> {
        let config = config.normalized();
        let encryptor = Encryptor::new(config.encrypt_saves, &config.encryption_key)?;
        Ok(Self { config, encryptor })
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    pub fn encryptor(&self) -> &Encryptor {
        &self.encryptor
    }

    /// Every folder under the saves root whose name starts with the prefix.
    pub fn save_folders(&self) -> SaveResult<Vec<(String, PathBuf)>> {
        let root = self.config.saves_root();
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut folders = Vec::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with(&self.config.save_folder_prefix) {
                    folders.push((name.to_string(), path));
                }
            }
        }
        folders.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(folders)
    }

    pub fn count_save_folders(&self) -> SaveResult<usize> {
        Ok(self.save_folders()?.len())
    }

    /// All readable saves with thumbnails, newest first.
    pub fn read_all_saves(&self) -> SaveResult<Vec<SaveSummary>> {
        self.read_many(true)
    }

    /// All readable saves without thumbnails, newest first.
    pub fn read_saves_meta(&self) -> SaveResult<Vec<SaveSummary>> {
        self.read_many(false)
    }

    /// One save by folder name. A missing folder or info file yields the default summary.
    pub fn read_save(&self, folder_name: &str) -> SaveResult<SaveSummary> {
        Ok(self
            .read_summary(folder_name, true)?
            .unwrap_or_default())
    }

    /// Read the info document of one folder.
    pub fn read_info(&self, folder_name: &str) -> SaveResult<SaveInfo> {
        let path = self.config.save_folder(folder_name).join(self.config.info_file_name());
        let doc = storage::read_document(&path, &self.encryptor)?;
        SaveInfo::from_storable(&doc).map_err(|e| SaveError::corrupt(&path, e))
    }

    /// Read both documents of one save and verify they belong together.
    ///
    /// Order: info first, then existence of the data file it names, then the
    /// data document, then the id comparison. Nothing is returned on mismatch.
    pub fn read_save_pair(&self, folder_name: &str) -> SaveResult<(SaveInfo, SaveData)> {
        let folder = self.config.save_folder(folder_name);
        let info = self.read_info(folder_name)?;

        let data_path = folder.join(&info.data);
        if !data_path.is_file() {
            return Err(SaveError::MissingDataFile { path: data_path });
        }

        let doc = storage::read_document(&data_path, &self.encryptor)?;
        let data = SaveData::from_storable(&doc).map_err(|e| SaveError::corrupt(&data_path, e))?;

        if info.id != data.id {
            return Err(SaveError::IntegrityMismatch {
                info_id: info.id,
                data_id: data.id,
            });
        }
        Ok((info, data))
    }

    /// Delete every save folder, one parallel task per folder.
    /// All failures are collected; a failed folder does not stop the others.
    pub fn remove_all_saves(&self) -> SaveResult<()> {
        let folders = self.save_folders()?;
        let failures: Vec<(PathBuf, std::io::Error)> = folders
            .into_par_iter()
            .filter_map(|(_, path)| match fs::remove_dir_all(&path) {
                Ok(()) => None,
                Err(e) => Some((path, e)),
            })
            .collect();

        if failures.is_empty() {
            log::info!("reader: removed all saves under {}", self.config.saves_root().display());
            Ok(())
        } else {
            for (path, e) in &failures {
                log::error!("reader: failed to remove {}: {e}", path.display());
            }
            Err(SaveError::RemoveFailed { failures })
        }
    }

    fn read_many(&self, with_thumbnails: bool) -> SaveResult<Vec<SaveSummary>> {
        let mut summaries = Vec::new();
        for (name, _) in self.save_folders()? {
            match self.read_summary(&name, with_thumbnails) {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(e) => log::warn!("reader: skipping save folder {name}: {e}"),
            }
        }
        summaries.sort_by(|a, b| b.date_time.cmp(&a.date_time));
        Ok(summaries)
    }

    fn read_summary(&self, folder_name: &str, with_thumbnail: bool) -> SaveResult<Option<SaveSummary>> {
        let folder = self.config.save_folder(folder_name);
        let info_path = folder.join(self.config.info_file_name());
        if !folder.is_dir() || !info_path.is_file() {
            return Ok(None);
        }

        let info = self.read_info(folder_name)?;
        let thumbnail_name = info.thumbnail.clone();
        let mut summary = SaveSummary::from_info(folder_name, info);

        if with_thumbnail && !thumbnail_name.is_empty() {
            let thumb_path = folder.join(&thumbnail_name);
            if thumb_path.is_file() {
                match storage::read_thumbnail(&thumb_path) {
                    Ok(image) => summary.thumbnail = Some(image),
                    Err(e) => log::warn!("reader: unreadable thumbnail in {folder_name}: {e}"),
                }
            }
        }
        Ok(Some(summary))
    }
}
