//! Room-key generation and format validation.

use rand::{Rng, rngs::OsRng};

/// Canonical room-key length.
pub const ROOM_KEY_LEN: usize = 6;

/// Alphabet for generated room keys.
///
/// Uppercase letters and digits minus the characters that are easy to
/// confuse when read aloud or handwritten: no `I`, `L`, `O`, `0`, `1`.
pub const ROOM_KEY_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generate a new room key.
///
/// Six characters drawn uniformly from [`ROOM_KEY_ALPHABET`] using the OS
/// random source. Predictable keys would let an attacker guess and read a
/// room, so a CSPRNG is required here, not a convenience.
///
/// Generation does not check uniqueness against existing rooms; creation
/// treats an id collision as a recoverable conflict and retries with a
/// fresh key.
pub fn generate() -> String {
    let mut rng = OsRng;
    (0..ROOM_KEY_LEN)
        .map(|_| char::from(ROOM_KEY_ALPHABET[rng.gen_range(0..ROOM_KEY_ALPHABET.len())]))
        .collect()
}

/// Check a room key against the canonical format.
///
/// Accepts exactly six uppercase ASCII letters or digits. Validation is
/// deliberately wider than the generator's alphabet so keys typed from
/// another client that used the full `A-Z0-9` space still join.
pub fn is_valid(room_key: &str) -> bool {
    room_key.len() == ROOM_KEY_LEN
        && room_key.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
