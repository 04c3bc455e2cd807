//! Document file I/O.
//!
//! RULE: Only storage.rs reads or writes document bytes.
//! Every document is written to a `.tmp` sibling and renamed over the target,
//! so a single file is never left half-written. Nothing spans two files:
//! the info → data ordering gap is owned by the manager.

use crate::{
    codec,
    crypto::Encryptor,
    error::{SaveError, SaveResult},
    storable::StorableCollection,
};
use image::RgbaImage;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Serialize, encrypt and write one document.
pub fn write_document(
    path: &Path,
    document: &StorableCollection,
    encryptor: &Encryptor,
) -> SaveResult<()> {
    let text = codec::serialize(document)?;
    let bytes = encryptor.encrypt(&text);
    write_bytes_atomic(path, &bytes)?;
    log::debug!("storage: wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Read, decrypt and parse one document.
/// Decrypt and parse failures are both reported as CorruptSave.
pub fn read_document(path: &Path, encryptor: &Encryptor) -> SaveResult<StorableCollection> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Err(SaveError::corrupt(path, "file is empty"));
    }
    let text = encryptor
        .decrypt(&bytes)
        .map_err(|e| SaveError::corrupt(path, e))?;
    codec::deserialize(&text).map_err(|e| SaveError::corrupt(path, e))
}

pub fn write_thumbnail(path: &Path, image: &RgbaImage) -> SaveResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_path_for(path);
    image.save_with_format(&tmp_path, image::ImageFormat::Png)?;
    replace_file(&tmp_path, path)?;
    Ok(())
}

pub fn read_thumbnail(path: &Path) -> SaveResult<RgbaImage> {
    Ok(image::open(path)?.to_rgba8())
}

pub(crate) fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, bytes)?;
    replace_file(&tmp_path, path)
}

/// Rename over the target. The previous document stays in place until the rename
/// succeeds; on failure only the temp file is discarded.
fn replace_file(tmp_path: &Path, final_path: &Path) -> io::Result<()> {
    fs::rename(tmp_path, final_path).map_err(|error| {
        let _ = fs::remove_file(tmp_path);
        error
    })
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}
