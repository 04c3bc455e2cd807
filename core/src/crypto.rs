//! Encryption envelope: AES-CBC over a UTF-8 text blob.
//!
//! RULE: Key bytes are the UTF-8 encoding of the configured key string, no KDF.
//! The key length picks the cipher: 16 → AES-128, 24 → AES-192, 32 → AES-256.
//!
//! FORMAT: Every blob is encrypted with ZERO_IV. Identical plaintexts therefore
//! produce identical ciphertexts. This is kept so that saves written by earlier
//! builds stay readable; moving to a random per-file IV requires a format
//! version bump and a migration path for existing save folders.
//!
//! When encryption is disabled both directions are the identity over UTF-8 bytes.

use crate::error::{SaveError, SaveResult};
use aes::{
    cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit},
    Aes128, Aes192, Aes256,
};
use thiserror::Error;

pub const BLOCK_SIZE: usize = 16;

/// The fixed initialization vector used by every save on disk.
pub const ZERO_IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecryptError {
    #[error("ciphertext length {0} is not a non-zero multiple of {BLOCK_SIZE}")]
    BadLength(usize),

    #[error("invalid padding")]
    BadPadding,

    #[error("plaintext is not valid UTF-8")]
    NotUtf8,
}

enum BlockCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockCipher {
    fn from_key(key: &[u8]) -> SaveResult<Self> {
        let invalid = |_| SaveError::InvalidKeyLength { len: key.len() };
        match key.len() {
            16 => Ok(Self::Aes128(Aes128::new_from_slice(key).map_err(invalid)?)),
            24 => Ok(Self::Aes192(Aes192::new_from_slice(key).map_err(invalid)?)),
            32 => Ok(Self::Aes256(Aes256::new_from_slice(key).map_err(invalid)?)),
            len => Err(SaveError::InvalidKeyLength { len }),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes192(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
        }
    }
}

/// Encrypt/decrypt gate driven by the project's `encrypt_saves` flag.
pub struct Encryptor {
    cipher: Option<BlockCipher>,
}

impl Encryptor {
    /// Build the envelope. The key is only validated when encryption is enabled.
    pub fn new(enabled: bool, key: &str) -> SaveResult<Self> {
        let cipher = if enabled {
            Some(BlockCipher::from_key(key.as_bytes())?)
        } else {
            None
        };
        Ok(Self { cipher })
    }

    /// Identity envelope.
    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn encrypt(&self, plaintext: &str) -> Vec<u8> {
        let Some(cipher) = &self.cipher else {
            return plaintext.as_bytes().to_vec();
        };

        let mut data = pkcs7_pad(plaintext.as_bytes());
        let mut prev = ZERO_IV;
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            for (b, p) in chunk.iter_mut().zip(prev.iter()) {
                *b ^= p;
            }
            cipher.encrypt_block(chunk);
            prev.copy_from_slice(chunk);
        }
        data
    }

    pub fn decrypt(&self, bytes: &[u8]) -> Result<String, DecryptError> {
        let Some(cipher) = &self.cipher else {
            return String::from_utf8(bytes.to_vec()).map_err(|_| DecryptError::NotUtf8);
        };

        if bytes.is_empty() || bytes.len() % BLOCK_SIZE != 0 {
            return Err(DecryptError::BadLength(bytes.len()));
        }

        let mut data = bytes.to_vec();
        let mut prev = ZERO_IV;
        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            let mut ciphertext = [0u8; BLOCK_SIZE];
            ciphertext.copy_from_slice(chunk);
            cipher.decrypt_block(chunk);
            for (b, p) in chunk.iter_mut().zip(prev.iter()) {
                *b ^= p;
            }
            prev = ciphertext;
        }

        let plain_len = pkcs7_unpad(&data)?;
        data.truncate(plain_len);
        String::from_utf8(data).map_err(|_| DecryptError::NotUtf8)
    }
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    out
}

/// Returns the unpadded length.
fn pkcs7_unpad(data: &[u8]) -> Result<usize, DecryptError> {
    let pad_len = *data.last().ok_or(DecryptError::BadPadding)? as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(DecryptError::BadPadding);
    }
    let (body, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b as usize != pad_len) {
        return Err(DecryptError::BadPadding);
    }
    Ok(body.len())
}
