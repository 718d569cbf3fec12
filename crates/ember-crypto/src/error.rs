//! Error types for sealing and opening room messages.

use thiserror::Error;

/// Errors from [`crate::encrypt`].
///
/// Encryption over valid inputs cannot fail; this exists for catastrophic
/// internal failures only (e.g. the AEAD backend rejecting its own inputs).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    /// The AEAD implementation failed internally.
    #[error("encryption failed: {reason}")]
    Internal {
        /// Backend-reported failure description.
        reason: String,
    },
}

/// Errors from [`crate::decrypt`].
///
/// Every variant is an explicit detection: decryption never silently returns
/// garbage bytes as text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    /// The ciphertext string is not valid base64.
    #[error("ciphertext is not valid base64")]
    InvalidEncoding,

    /// The decoded ciphertext is too short to contain a nonce and tag.
    #[error("ciphertext truncated: {len} bytes")]
    Truncated {
        /// Decoded length in bytes.
        len: usize,
    },

    /// Authentication failed: wrong room key, or the ciphertext was tampered
    /// with or produced under a different key.
    #[error("authentication failed: wrong key or corrupted ciphertext")]
    AuthenticationFailed,

    /// Decryption succeeded but the plaintext is not valid UTF-8.
    #[error("decrypted plaintext is not valid UTF-8")]
    InvalidUtf8,
}
