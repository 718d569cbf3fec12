//! Message sealing with XChaCha20-Poly1305.
//!
//! The wire form of a sealed message is `base64(nonce || ciphertext)` where
//! the nonce is 24 random bytes and the ciphertext carries a 16-byte
//! Poly1305 tag. The store and relay treat the whole string as opaque.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroizing;

use crate::{
    derivation::{DERIVED_KEY_SIZE, derive_room_key},
    error::{DecryptionError, EncryptionError},
};

/// Size of the XChaCha20 nonce prefix in bytes.
const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes).
const POLY1305_TAG_SIZE: usize = 16;

/// A cipher bound to one room key.
///
/// Holds the stretched key so the expensive PBKDF2 derivation runs once per
/// session instead of once per message. The cached key is zeroed when the
/// cipher is dropped.
pub struct RoomCipher {
    key: Zeroizing<[u8; DERIVED_KEY_SIZE]>,
}

impl RoomCipher {
    /// Derive the symmetric key for `room_key` and cache it.
    pub fn new(room_key: &str) -> Self {
        Self { key: Zeroizing::new(derive_room_key(room_key)) }
    }

    /// Seal a plaintext message.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError::Internal`] only if the AEAD backend fails,
    /// which cannot happen for valid inputs.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let cipher = XChaCha20Poly1305::new(self.key.as_ref().into());

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| EncryptionError::Internal { reason: e.to_string() })?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    /// Open a sealed message.
    ///
    /// # Errors
    ///
    /// - [`DecryptionError::InvalidEncoding`]: not valid base64
    /// - [`DecryptionError::Truncated`]: too short for nonce + tag
    /// - [`DecryptionError::AuthenticationFailed`]: wrong key or tampering
    /// - [`DecryptionError::InvalidUtf8`]: plaintext is not text
    pub fn decrypt(&self, sealed: &str) -> Result<String, DecryptionError> {
        let combined = BASE64.decode(sealed).map_err(|_| DecryptionError::InvalidEncoding)?;

        if combined.len() < NONCE_SIZE + POLY1305_TAG_SIZE {
            return Err(DecryptionError::Truncated { len: combined.len() });
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
        let cipher = XChaCha20Poly1305::new(self.key.as_ref().into());

        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| DecryptionError::AuthenticationFailed)?;

        String::from_utf8(plaintext).map_err(|_| DecryptionError::InvalidUtf8)
    }
}

/// Seal `plaintext` under `room_key`.
///
/// One-shot convenience that re-derives the key; prefer [`RoomCipher`] when
/// sealing more than one message for the same room.
pub fn encrypt(plaintext: &str, room_key: &str) -> Result<String, EncryptionError> {
    RoomCipher::new(room_key).encrypt(plaintext)
}

/// Open `sealed` under `room_key`.
///
/// One-shot convenience that re-derives the key; prefer [`RoomCipher`] when
/// opening more than one message for the same room.
pub fn decrypt(sealed: &str, room_key: &str) -> Result<String, DecryptionError> {
    RoomCipher::new(room_key).decrypt(sealed)
}
