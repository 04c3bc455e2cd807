//! Save directory reader.
//!
//! 1. read_all_saves returns every readable folder, newest first
//! 2. Folders without an info file, or that fail to decrypt/parse, are skipped
//! 3. read_save returns the default summary for a missing folder
//! 4. Thumbnails load in read_all_saves and are skipped by read_saves_meta
//! 5. read_save_pair enforces data-file existence and id equality
//! 6. remove_all_saves empties the saves root

use chrono::{Duration, Local};
use image::{Rgba, RgbaImage};
use nightshade_core::{
    codec::{SaveData, SaveInfo},
    crypto::Encryptor,
    reader::SaveDirectoryReader,
    storage,
    types::SaveType,
    SaveConfig, SaveError,
};
use std::path::Path;

fn config(root: &Path, encrypted: bool) -> SaveConfig {
    SaveConfig {
        encrypt_saves: encrypted,
        encryption_key: "0123456789abcdef".into(),
        ..SaveConfig::with_root(root)
    }
}

/// Write a complete save folder. `age_minutes` pushes the timestamp into the past.
fn write_save(
    config: &SaveConfig,
    folder: &str,
    scene: &str,
    save_type: SaveType,
    age_minutes: i64,
    thumbnail: bool,
) -> String {
    let enc = Encryptor::new(config.encrypt_saves, &config.encryption_key).unwrap();
    let dir = config.save_folder(folder);
    let id = format!("id-{folder}");

    let mut thumbnail_name = String::new();
    if thumbnail {
        thumbnail_name = config.thumbnail_file_name();
        let image = RgbaImage::from_pixel(4, 2, Rgba([200, 10, 10, 255]));
        storage::write_thumbnail(&dir.join(&thumbnail_name), &image).unwrap();
    }

    let info = SaveInfo {
        id:          id.clone(),
        scene:       scene.into(),
        date_time:   Local::now() - Duration::minutes(age_minutes),
        time_played: 60.0 * age_minutes as f64,
        save_type,
        data:        config.data_file_name(),
        thumbnail:   thumbnail_name,
    };
    let data = SaveData { id: id.clone(), ..SaveData::default() };

    storage::write_document(&dir.join(config.info_file_name()), &info.to_storable(), &enc).unwrap();
    storage::write_document(&dir.join(config.data_file_name()), &data.to_storable(), &enc).unwrap();
    id
}

// ─────────────────────────────────────────────────────────────────────────────
// Enumeration
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn read_all_saves_orders_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), true);
    write_save(&config, "Save000", "Cellar", SaveType::Normal, 30, false);
    write_save(&config, "Save001", "Asylum", SaveType::Autosave, 5, false);
    write_save(&config, "Save002", "Morgue", SaveType::NextScene, 60, false);

    let reader = SaveDirectoryReader::new(config).unwrap();
    let saves = reader.read_all_saves().expect("read_all_saves");

    let folders: Vec<_> = saves.iter().map(|s| s.folder_name.as_str()).collect();
    assert_eq!(folders, vec!["Save001", "Save000", "Save002"]);
    assert!(saves[0].is_autosave);
    assert_eq!(saves[0].scene, "Asylum");
    assert_eq!(saves[0].id, "id-Save001");
    assert_eq!(saves[2].save_type, Some(SaveType::NextScene));
}

#[test]
fn unreadable_folders_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), true);
    write_save(&config, "Save000", "Cellar", SaveType::Normal, 1, false);

    // No info file at all.
    std::fs::create_dir_all(config.save_folder("Save001")).unwrap();
    // Garbage info file.
    let corrupt = config.save_folder("Save002");
    std::fs::create_dir_all(&corrupt).unwrap();
    std::fs::write(corrupt.join(config.info_file_name()), b"definitely not a save").unwrap();
    // Folder without the prefix is not a save folder.
    write_save(&config, "Save003", "Cellar", SaveType::Normal, 2, false);
    std::fs::rename(config.save_folder("Save003"), config.saves_root().join("Backup")).unwrap();

    let reader = SaveDirectoryReader::new(config).unwrap();
    let saves = reader.read_all_saves().unwrap();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].folder_name, "Save000");
    assert_eq!(reader.count_save_folders().unwrap(), 3);
}

#[test]
fn wrong_key_skips_every_folder() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), true);
    write_save(&config, "Save000", "Cellar", SaveType::Normal, 1, false);

    let other = SaveConfig {
        encryption_key: "fedcba9876543210".into(),
        ..config
    };
    let reader = SaveDirectoryReader::new(other).unwrap();
    assert!(reader.read_all_saves().unwrap().is_empty());
}

#[test]
fn missing_saves_root_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let reader = SaveDirectoryReader::new(config(&dir.path().join("nowhere"), false)).unwrap();
    assert!(reader.read_all_saves().unwrap().is_empty());
    assert_eq!(reader.count_save_folders().unwrap(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Single folder
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn read_save_of_missing_folder_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let reader = SaveDirectoryReader::new(config(dir.path(), false)).unwrap();
    let summary = reader.read_save("Save042").expect("not an error");
    assert!(summary.is_empty());
    assert!(summary.date_time.is_none());
}

#[test]
fn thumbnails_load_only_in_full_read() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), false);
    write_save(&config, "Save000", "Cellar", SaveType::Normal, 1, true);

    let reader = SaveDirectoryReader::new(config).unwrap();
    let full = reader.read_save("Save000").unwrap();
    let thumb = full.thumbnail.expect("thumbnail decoded");
    assert_eq!(thumb.dimensions(), (4, 2));
    assert_eq!(thumb.get_pixel(0, 0), &Rgba([200, 10, 10, 255]));

    let meta = reader.read_saves_meta().unwrap();
    assert_eq!(meta.len(), 1);
    assert!(meta[0].thumbnail.is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Read protocol
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn save_pair_reads_matching_documents() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), true);
    let id = write_save(&config, "Save000", "Cellar", SaveType::Normal, 1, false);

    let reader = SaveDirectoryReader::new(config).unwrap();
    let (info, data) = reader.read_save_pair("Save000").expect("pair");
    assert_eq!(info.id, id);
    assert_eq!(data.id, id);
}

#[test]
fn id_mismatch_is_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), true);
    write_save(&config, "Save000", "Cellar", SaveType::Normal, 1, false);

    // Replace only the data document with one carrying a different id.
    let enc = Encryptor::new(true, &config.encryption_key).unwrap();
    let stray = SaveData { id: "someone-else".into(), ..SaveData::default() };
    let data_path = config.save_folder("Save000").join(config.data_file_name());
    storage::write_document(&data_path, &stray.to_storable(), &enc).unwrap();

    let reader = SaveDirectoryReader::new(config).unwrap();
    match reader.read_save_pair("Save000") {
        Err(SaveError::IntegrityMismatch { info_id, data_id }) => {
            assert_eq!(info_id, "id-Save000");
            assert_eq!(data_id, "someone-else");
        }
        other => panic!("expected IntegrityMismatch, got {other:?}"),
    }
}

#[test]
fn missing_data_file_fails_before_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), false);
    write_save(&config, "Save000", "Cellar", SaveType::Normal, 1, false);
    std::fs::remove_file(config.save_folder("Save000").join(config.data_file_name())).unwrap();

    let reader = SaveDirectoryReader::new(config).unwrap();
    assert!(matches!(
        reader.read_save_pair("Save000"),
        Err(SaveError::MissingDataFile { .. })
    ));
    // The summary is still readable: only loading needs the data document.
    assert!(!reader.read_save("Save000").unwrap().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Bulk delete
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn remove_all_saves_empties_root() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), true);
    for i in 0..5 {
        write_save(&config, &format!("Save{i:03}"), "Cellar", SaveType::Normal, i, i % 2 == 0);
    }
    std::fs::create_dir_all(config.saves_root().join("Unrelated")).unwrap();

    let reader = SaveDirectoryReader::new(config.clone()).unwrap();
    assert_eq!(reader.read_all_saves().unwrap().len(), 5);

    reader.remove_all_saves().expect("remove_all_saves");
    assert!(reader.read_all_saves().unwrap().is_empty());
    assert_eq!(reader.count_save_folders().unwrap(), 0);
    assert!(config.saves_root().join("Unrelated").is_dir());
}
