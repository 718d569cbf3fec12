//! Local client pseudo-identity.
//!
//! Each client profile carries a locally generated id and display name,
//! persisted in client-local storage and regenerated when absent. The store
//! is a capability-scoped key-value surface with an explicit fallback
//! policy: on storage failure, generate and don't persist, silently.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use ember_core::ClientId;
use ember_crypto::ROOM_KEY_ALPHABET;
use rand::{Rng, rngs::OsRng};
use thiserror::Error;

/// Storage key for the persisted client id.
const CLIENT_ID_KEY: &str = "ember_client_id";

/// Storage key for the persisted display name.
const DISPLAY_NAME_KEY: &str = "ember_display_name";

/// Length of the random suffix in throwaway `Guest-XXXX` names.
const NAME_SUFFIX_LEN: usize = 4;

/// Adjectives for generated anonymous display names.
const NAME_ADJECTIVES: &[&str] = &[
    "Anonymous",
    "Silent",
    "Quiet",
    "Mysterious",
    "Hidden",
    "Secret",
    "Phantom",
    "Shadow",
    "Whisper",
    "Echo",
];

/// Nouns for generated anonymous display names.
const NAME_NOUNS: &[&str] = &[
    "User", "Visitor", "Guest", "Stranger", "Friend", "Sender", "Writer", "Voice", "Mind", "Soul",
];

/// A client-local key-value store failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("identity store failure: {0}")]
pub struct IdentityStoreError(pub String);

/// Client-local persistent key-value storage.
///
/// Narrow on purpose: the identity layer only ever reads and writes its own
/// two keys, and treats every failure as "storage unavailable".
pub trait IdentityStore {
    /// Read a value, `None` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, IdentityStoreError>;

    /// Write a value.
    fn put(&self, key: &str, value: &str) -> Result<(), IdentityStoreError>;
}

/// The local pseudo-identity a session acts under.
///
/// Not authenticated; unique per client profile in practice because the id
/// is 128 random bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Pseudo-identity used as sender tag and presence key.
    pub client_id: ClientId,
    /// Self-chosen display name announced over presence.
    pub display_name: String,
}

impl ClientIdentity {
    /// Load the persisted identity, generating and persisting any missing
    /// part.
    ///
    /// A fresh profile gets an anonymous adjective+noun+number display name.
    /// When the store fails on read or write, the value is generated fresh
    /// and simply not persisted — a throwaway `Guest-XXXX` name marks the
    /// unpersisted case; identity loading never fails.
    pub fn load_or_generate(store: &impl IdentityStore) -> Self {
        Self {
            client_id: load_or_generate_value(
                store,
                CLIENT_ID_KEY,
                generate_client_id,
                generate_client_id,
            ),
            display_name: load_or_generate_value(
                store,
                DISPLAY_NAME_KEY,
                generate_display_name,
                generate_guest_name,
            ),
        }
    }

    /// A throwaway identity that is never persisted.
    pub fn ephemeral() -> Self {
        Self { client_id: generate_client_id(), display_name: generate_guest_name() }
    }
}

fn load_or_generate_value(
    store: &impl IdentityStore,
    key: &str,
    generate: fn() -> String,
    ephemeral: fn() -> String,
) -> String {
    match store.get(key) {
        Ok(Some(value)) => value,
        Ok(None) => {
            let value = generate();
            if let Err(e) = store.put(key, &value) {
                tracing::debug!(key, error = %e, "identity not persisted");
            }
            value
        },
        Err(e) => {
            tracing::debug!(key, error = %e, "identity store unavailable, using ephemeral value");
            ephemeral()
        },
    }
}

/// 128 random bits as lowercase hex.
fn generate_client_id() -> String {
    format!("{:032x}", OsRng.r#gen::<u128>())
}

/// Anonymous `AdjectiveNoun123` display name.
fn generate_display_name() -> String {
    let mut rng = OsRng;
    let adjective = NAME_ADJECTIVES[rng.gen_range(0..NAME_ADJECTIVES.len())];
    let noun = NAME_NOUNS[rng.gen_range(0..NAME_NOUNS.len())];
    let number = rng.gen_range(0..1000u16);
    format!("{adjective}{noun}{number}")
}

/// `Guest-XXXX` with a suffix drawn from the room-key alphabet.
fn generate_guest_name() -> String {
    let mut rng = OsRng;
    let suffix: String = (0..NAME_SUFFIX_LEN)
        .map(|_| char::from(ROOM_KEY_ALPHABET[rng.gen_range(0..ROOM_KEY_ALPHABET.len())]))
        .collect();
    format!("Guest-{suffix}")
}

/// In-memory identity store for tests and simulation.
///
/// # Panics
///
/// Operations panic if the internal mutex is poisoned. Acceptable for
/// test/simulation code.
#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    broken: Arc<Mutex<bool>>,
}

impl MemoryIdentityStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail, mimicking an unavailable
    /// client-local storage.
    #[allow(clippy::expect_used)]
    pub fn set_broken(&self, broken: bool) {
        *self.broken.lock().expect("mutex poisoned") = broken;
    }

    #[allow(clippy::expect_used)]
    fn check(&self) -> Result<(), IdentityStoreError> {
        if *self.broken.lock().expect("mutex poisoned") {
            return Err(IdentityStoreError("storage unavailable".into()));
        }
        Ok(())
    }
}

impl IdentityStore for MemoryIdentityStore {
    #[allow(clippy::expect_used)]
    fn get(&self, key: &str) -> Result<Option<String>, IdentityStoreError> {
        self.check()?;
        Ok(self.values.lock().expect("mutex poisoned").get(key).cloned())
    }

    #[allow(clippy::expect_used)]
    fn put(&self, key: &str, value: &str) -> Result<(), IdentityStoreError> {
        self.check()?;
        self.values.lock().expect("mutex poisoned").insert(key.to_string(), value.to_string());
        Ok(())
    }
}
