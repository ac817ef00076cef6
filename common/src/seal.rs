//! Sealed-document codec for the distributable target list.
//!
//! A sealed document is the fixed magic line followed by
//! ChaCha20-Poly1305 ciphertext over the plaintext list. Key, nonce and
//! associated data are fixed build-time material: the seal is an
//! obfuscation and tamper check for distribution, not a secrecy boundary.
//! Loaders detect the magic and fall back to plaintext without it.

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use thiserror::Error;

pub const SEAL_MAGIC: &[u8] = b"FSEAL1\n";

const SEAL_KEY: [u8; 32] = *b"01234567890123456789012345678901";
const SEAL_NONCE: [u8; 12] = *b"012345678901";
const SEAL_AAD: &[u8] = b"0123456789012345678";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SealError {
    #[error("document is not sealed")]
    NotSealed,

    #[error("sealed document failed authentication")]
    Authentication,

    #[error("sealed document is not valid utf-8")]
    Encoding,

    #[error("sealing failed")]
    Sealing,
}

pub fn is_sealed(bytes: &[u8]) -> bool {
    bytes.starts_with(SEAL_MAGIC)
}

/// Produces the sealed form of a plaintext document.
pub fn seal(plaintext: &str) -> Result<Vec<u8>, SealError> {
    let key = seal_key()?;
    let mut buf = plaintext.as_bytes().to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(SEAL_NONCE),
        Aad::from(SEAL_AAD),
        &mut buf,
    )
    .map_err(|_| SealError::Sealing)?;

    let mut sealed = Vec::with_capacity(SEAL_MAGIC.len() + buf.len());
    sealed.extend_from_slice(SEAL_MAGIC);
    sealed.extend_from_slice(&buf);
    Ok(sealed)
}

/// Opens a sealed document back into plaintext.
pub fn open(bytes: &[u8]) -> Result<String, SealError> {
    let ciphertext = bytes
        .strip_prefix(SEAL_MAGIC)
        .ok_or(SealError::NotSealed)?;

    let key = seal_key()?;
    let mut buf = ciphertext.to_vec();
    let plaintext = key
        .open_in_place(
            Nonce::assume_unique_for_key(SEAL_NONCE),
            Aad::from(SEAL_AAD),
            &mut buf,
        )
        .map_err(|_| SealError::Authentication)?;

    String::from_utf8(plaintext.to_vec()).map_err(|_| SealError::Encoding)
}

fn seal_key() -> Result<LessSafeKey, SealError> {
    let unbound =
        UnboundKey::new(&aead::CHACHA20_POLY1305, &SEAL_KEY).map_err(|_| SealError::Sealing)?;
    Ok(LessSafeKey::new(unbound))
}
