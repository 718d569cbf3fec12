//! Ember Cryptographic Primitives
//!
//! Cryptographic building blocks for Ember rooms. Pure functions with
//! deterministic key derivation; the only source of randomness is the
//! per-message nonce and the room-key generator.
//!
//! # Key Lifecycle
//!
//! The room key is both the room's public identifier and the secret material
//! every participant stretches into the symmetric encryption key. Nothing is
//! exchanged beyond the room key itself.
//!
//! ```text
//! Room Key ("AB12CD")
//!        │
//!        ▼
//! PBKDF2-HMAC-SHA256 (fixed salt, fixed iterations) → 32-byte key
//!        │
//!        ▼
//! XChaCha20-Poly1305 + random 24-byte nonce → base64(nonce || ciphertext)
//! ```
//!
//! # Wire compatibility
//!
//! [`PBKDF2_SALT`] and [`PBKDF2_ITERATIONS`] are protocol constants, not
//! configuration. Every implementation sharing them derives byte-identical
//! keys from the same room key, which is what lets independently written
//! clients read each other's messages.
//!
//! # Security
//!
//! - The room key doubles as the secret: anyone who can name the room can
//!   decrypt it. Key stretching only slows brute-force over the short key
//!   space; it does not change that trade-off.
//! - Failed authentication tag -> reject message. Decryption never yields
//!   unverified plaintext.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cipher;
mod derivation;
mod error;
mod room_key;

pub use cipher::{RoomCipher, decrypt, encrypt};
pub use derivation::{DERIVED_KEY_SIZE, PBKDF2_ITERATIONS, PBKDF2_SALT, derive_room_key};
pub use error::{DecryptionError, EncryptionError};
pub use room_key::{ROOM_KEY_ALPHABET, ROOM_KEY_LEN, generate, is_valid};
