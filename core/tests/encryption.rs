//! Encryption envelope and encrypted document files.
//!
//! 1. Disabled: both directions are the identity, bytes on disk are the UTF-8 text
//! 2. Enabled: round trip for arbitrary text including multi-byte UTF-8
//! 3. A different key never yields the original text
//! 4. Encrypted documents on disk fail as CorruptSave under the wrong key

use nightshade_core::{
    crypto::{Encryptor, ZERO_IV},
    storage, SaveError, StorableCollection,
};

const KEY_A: &str = "night-shade-key1";
const KEY_B: &str = "night-shade-key2";

#[test]
fn disabled_envelope_is_identity() {
    let enc = Encryptor::disabled();
    assert!(!enc.is_enabled());
    for text in ["", "plain", "{\"id\":\"x\"}", "ゆうれい 👻"] {
        let bytes = enc.encrypt(text);
        assert_eq!(bytes, text.as_bytes());
        assert_eq!(enc.decrypt(&bytes).unwrap(), text);
    }
}

#[test]
fn disabled_flag_ignores_key() {
    let enc = Encryptor::new(false, KEY_A).unwrap();
    assert_eq!(enc.encrypt("abc"), b"abc");
}

#[test]
fn enabled_round_trip() {
    let enc = Encryptor::new(true, KEY_A).unwrap();
    let long = "corridor ".repeat(100);
    for text in ["a", "exactly sixteen!", "ゆうれい 👻 — the ward is quiet", long.as_str()] {
        let bytes = enc.encrypt(text);
        assert_ne!(bytes, text.as_bytes());
        assert_eq!(bytes.len() % 16, 0);
        assert_eq!(enc.decrypt(&bytes).unwrap(), text);
    }
}

#[test]
fn fixed_iv_makes_encryption_deterministic() {
    assert_eq!(ZERO_IV, [0u8; 16]);
    let enc = Encryptor::new(true, KEY_A).unwrap();
    assert_eq!(enc.encrypt("same text"), enc.encrypt("same text"));
}

#[test]
fn wrong_key_never_returns_plaintext() {
    let a = Encryptor::new(true, KEY_A).unwrap();
    let b = Encryptor::new(true, KEY_B).unwrap();
    for text in ["hello", "{\"id\": \"1234\", \"scene\": \"Cellar\"}", "ゆうれい"] {
        let ciphertext = a.encrypt(text);
        match b.decrypt(&ciphertext) {
            Ok(garbage) => assert_ne!(garbage, text),
            Err(_) => {}
        }
    }
}

#[test]
fn truncated_ciphertext_is_rejected() {
    let enc = Encryptor::new(true, KEY_A).unwrap();
    let bytes = enc.encrypt("some save text");
    assert!(enc.decrypt(&bytes[..bytes.len() - 1]).is_err());
    assert!(enc.decrypt(&[]).is_err());
}

#[test]
fn encrypted_document_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Save000").join("SaveInfo.sav");
    let enc = Encryptor::new(true, "0123456789abcdef0123456789abcdef").unwrap();
    let doc = StorableCollection::new().with("id", "abc").with("scene", "Morgue");

    storage::write_document(&path, &doc, &enc).expect("write");
    let raw = std::fs::read(&path).unwrap();
    assert!(!raw.windows(6).any(|w| w == b"Morgue"), "scene name must not be readable");
    assert!(!path.with_file_name("SaveInfo.sav.tmp").exists());

    assert_eq!(storage::read_document(&path, &enc).unwrap(), doc);
}

#[test]
fn plain_document_file_is_utf8_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("SaveData.sav");
    let doc = StorableCollection::new().with("id", "abc");

    storage::write_document(&path, &doc, &Encryptor::disabled()).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"id\": \"abc\""));
}

#[test]
fn wrong_key_on_disk_is_corrupt_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("SaveInfo.sav");
    let doc = StorableCollection::new().with("id", "abc");
    storage::write_document(&path, &doc, &Encryptor::new(true, KEY_A).unwrap()).unwrap();

    let err = storage::read_document(&path, &Encryptor::new(true, KEY_B).unwrap()).unwrap_err();
    assert!(matches!(err, SaveError::CorruptSave { .. }), "got {err:?}");

    // Reading encrypted bytes with encryption off is the same failure.
    let err = storage::read_document(&path, &Encryptor::disabled()).unwrap_err();
    assert!(matches!(err, SaveError::CorruptSave { .. }), "got {err:?}");
}

#[test]
fn empty_file_is_corrupt_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("SaveInfo.sav");
    std::fs::write(&path, b"").unwrap();
    assert!(matches!(
        storage::read_document(&path, &Encryptor::disabled()),
        Err(SaveError::CorruptSave { .. })
    ));
}
