//! Room-key stretching via PBKDF2-HMAC-SHA256.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

/// Size of the derived symmetric key in bytes.
pub const DERIVED_KEY_SIZE: usize = 32;

/// Fixed application-wide PBKDF2 salt.
///
/// Protocol constant: changing it breaks decryption of every existing room.
pub const PBKDF2_SALT: &[u8] = b"ember/room-key/v1";

/// Fixed PBKDF2 iteration count.
///
/// Protocol constant. High enough to slow brute-force search over the small
/// room-key space; callers cache the derived key per room (see
/// [`crate::RoomCipher`]) so the cost is paid once per session, not per
/// message.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Stretch a room key into a 32-byte symmetric key.
///
/// Pure and deterministic: the same room key always yields the same bytes,
/// across processes and implementations sharing [`PBKDF2_SALT`] and
/// [`PBKDF2_ITERATIONS`].
pub fn derive_room_key(room_key: &str) -> [u8; DERIVED_KEY_SIZE] {
    let mut key = [0u8; DERIVED_KEY_SIZE];
    pbkdf2_hmac::<Sha256>(room_key.as_bytes(), PBKDF2_SALT, PBKDF2_ITERATIONS, &mut key);
    key
}
