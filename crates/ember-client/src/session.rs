//! Room session state machine.
//!
//! One `RoomSession` per room key per client. The session owns the two
//! live subscriptions and all UI-visible room state; every mutation happens
//! on the caller's single dispatch loop, so nothing here needs locking
//! beyond the send-in-flight flag.

use ember_core::{
    ClientId, HostPolicy, InsertSubscription, Message, MessageBody, PresenceChannel,
    PresenceHandle, PresenceMeta, PresenceSnapshot, ROOM_CAPACITY, Roster, RoomKey, RoomStore,
    StoreError, StoredMessage,
};
use ember_crypto::RoomCipher;

use crate::{error::SessionError, event::SessionEvent, identity::ClientIdentity};

/// Maximum history rows fetched when entering a room. The fetch takes the
/// most recent window; older rows stay in the store but are not loaded.
pub const HISTORY_LIMIT: usize = 200;

/// Lifecycle of a room session.
///
/// ```text
/// Unvalidated → {Invalid, Checking} → {NotFound, Loading} → Ready → Closed
/// ```
///
/// `Invalid` and `NotFound` leave room creation open to the caller; `Closed`
/// is terminal and a closed session delivers no further events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed; the key has not been format-checked yet.
    Unvalidated,
    /// The key failed the format check.
    Invalid,
    /// Existence check against the store is in flight.
    Checking,
    /// The key is well-formed but no room row exists.
    NotFound,
    /// History fetch and subscription setup are in flight.
    Loading,
    /// Steady state: live and dispatching events.
    Ready,
    /// Torn down; both subscriptions dropped.
    Closed,
}

/// The orchestrating state machine bound to one room key.
///
/// Drive it like this: [`initialize`](Self::initialize), then loop over
/// [`next_event`](Self::next_event) feeding each event to
/// [`handle_event`](Self::handle_event), calling
/// [`send_message`](Self::send_message) /
/// [`create_room`](Self::create_room) from the same loop, and
/// [`close`](Self::close) on the way out.
pub struct RoomSession<S: RoomStore, P: PresenceChannel> {
    room_key: RoomKey,
    store: S,
    presence: P,
    identity: ClientIdentity,

    state: SessionState,
    /// Derived-key cache; built once the key has passed validation.
    cipher: Option<RoomCipher>,
    host: HostPolicy,
    messages: Vec<Message>,
    roster: Roster,

    /// Found-full marker set by the capacity re-check or a presence sync.
    room_full: bool,
    /// Whether this session announced its own presence.
    announced: bool,
    /// Send-in-flight flag: at most one outstanding send per session.
    sending: bool,

    inserts: Option<InsertSubscription>,
    presence_handle: Option<P::Handle>,
}

impl<S: RoomStore, P: PresenceChannel> RoomSession<S, P> {
    /// Bind a session to `room_key`. No I/O happens until
    /// [`initialize`](Self::initialize).
    pub fn new(room_key: impl Into<RoomKey>, store: S, presence: P, identity: ClientIdentity) -> Self {
        Self {
            room_key: room_key.into(),
            store,
            presence,
            identity,
            state: SessionState::Unvalidated,
            cipher: None,
            host: HostPolicy::Unknown,
            messages: Vec::new(),
            roster: Roster::default(),
            room_full: false,
            announced: false,
            sending: false,
            inserts: None,
            presence_handle: None,
        }
    }

    /// Validate the key, check room existence, and enter the room.
    ///
    /// Callable from `Unvalidated`, and again from `NotFound` after losing
    /// a creation race ("already exists" usually means "just join it").
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidKey`]: format check failed; terminal
    /// - [`SessionError::NotFound`]: no room row; caller may
    ///   [`create_room`](Self::create_room)
    /// - [`SessionError::RoomFull`]: joined as reader but presence announce
    ///   was refused at capacity
    /// - [`SessionError::Store`]: the existence check or subscription setup
    ///   failed
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::Unvalidated | SessionState::NotFound) {
            return Err(SessionError::NotReady);
        }

        if !ember_crypto::is_valid(&self.room_key) {
            self.state = SessionState::Invalid;
            return Err(SessionError::InvalidKey);
        }

        self.state = SessionState::Checking;
        let room = match self.store.get_room(&self.room_key).await {
            Ok(room) => room,
            Err(e) => {
                // Read path: degrade to "absent" rather than killing the
                // process, but surface the failure.
                tracing::warn!(room_key = %self.room_key, error = %e, "room existence check failed");
                self.state = SessionState::NotFound;
                return Err(e.into());
            },
        };

        let Some(room) = room else {
            self.state = SessionState::NotFound;
            return Err(SessionError::NotFound);
        };

        self.state = SessionState::Loading;
        self.enter_room(room.creator_id).await
    }

    /// Create the room row with this client as recorded creator, then enter
    /// it.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidKey`]: key failed the format check
    /// - [`SessionError::AlreadyExists`]: another client won the creation
    ///   race; the caller's usual answer is to `initialize` again and join
    /// - [`SessionError::RateLimited`]: creation throttled, retry later
    pub async fn create_room(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Invalid => return Err(SessionError::InvalidKey),
            SessionState::NotFound | SessionState::Unvalidated => {},
            SessionState::Ready | SessionState::Loading => return Err(SessionError::AlreadyExists),
            SessionState::Checking | SessionState::Closed => return Err(SessionError::NotReady),
        }

        if !ember_crypto::is_valid(&self.room_key) {
            self.state = SessionState::Invalid;
            return Err(SessionError::InvalidKey);
        }

        match self.store.create_room(&self.room_key, &self.identity.client_id).await {
            Ok(room) => {
                tracing::debug!(room_key = %self.room_key, "room created");
                self.state = SessionState::Loading;
                self.enter_room(room.creator_id).await
            },
            Err(StoreError::AlreadyExists { .. }) => {
                self.state = SessionState::NotFound;
                Err(SessionError::AlreadyExists)
            },
            Err(StoreError::RateLimited) => {
                self.state = SessionState::NotFound;
                Err(SessionError::RateLimited)
            },
            Err(e) => {
                self.state = SessionState::NotFound;
                Err(e.into())
            },
        }
    }

    /// Load history, resolve the host, and open both subscriptions.
    ///
    /// The capacity re-check runs after subscribing but before announcing:
    /// a 51st non-host joiner is never counted at all, instead of joining
    /// and then being kicked.
    async fn enter_room(&mut self, creator_id: Option<ClientId>) -> Result<(), SessionError> {
        let cipher = RoomCipher::new(&self.room_key);

        // History is a read path: a failed fetch degrades to an empty list.
        let rows = match self.store.list_messages(&self.room_key, HISTORY_LIMIT).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(room_key = %self.room_key, error = %e, "history fetch failed");
                Vec::new()
            },
        };

        // Host inference needs the true earliest row, which the trailing
        // history window may have evicted.
        let earliest = if creator_id.is_some() {
            None
        } else {
            match self.store.earliest_message(&self.room_key).await {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(room_key = %self.room_key, error = %e, "earliest message fetch failed");
                    None
                },
            }
        };

        self.host = HostPolicy::resolve(creator_id, earliest.as_ref());
        self.messages = rows.into_iter().map(|row| decrypt_row(&cipher, row)).collect();
        self.cipher = Some(cipher);

        // Subscription setup failures close the session: nothing may stay
        // in a loading state.
        let inserts = match self.store.subscribe_inserts(&self.room_key).await {
            Ok(sub) => sub,
            Err(e) => {
                self.state = SessionState::Closed;
                return Err(e.into());
            },
        };

        let handle = match self.presence.subscribe(&self.room_key, &self.identity.client_id).await
        {
            Ok(handle) => handle,
            Err(e) => {
                self.state = SessionState::Closed;
                return Err(e.into());
            },
        };

        let snapshot = handle.snapshot().await;
        self.roster = Roster::from_snapshot(&snapshot, &self.host);
        self.inserts = Some(inserts);

        if snapshot.len() >= ROOM_CAPACITY && !self.is_host() {
            tracing::warn!(
                room_key = %self.room_key,
                occupants = snapshot.len(),
                "room full, refusing to announce presence"
            );
            self.room_full = true;
            self.presence_handle = Some(handle);
            self.state = SessionState::Ready;
            return Err(SessionError::RoomFull);
        }

        if let Err(e) = handle
            .track(PresenceMeta { display_name: self.identity.display_name.clone() })
            .await
        {
            tracing::warn!(room_key = %self.room_key, error = %e, "presence announce failed");
        } else {
            self.announced = true;
        }

        self.presence_handle = Some(handle);
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Announce presence for a session that joined as a reader, after
    /// being refused at capacity or after a failed announce.
    ///
    /// Idempotent once announced. Re-checks the occupant count first, so a
    /// still-full room refuses again instead of overfilling.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotReady`]: the session is not `Ready`
    /// - [`SessionError::RoomFull`]: the room is still at capacity
    /// - [`SessionError::Store`]: the registry rejected the announce
    pub async fn announce(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::NotReady);
        }
        if self.announced {
            return Ok(());
        }
        let handle = self.presence_handle.as_ref().ok_or(SessionError::NotReady)?;

        let snapshot = handle.snapshot().await;
        if snapshot.len() >= ROOM_CAPACITY && !self.is_host() {
            self.room_full = true;
            return Err(SessionError::RoomFull);
        }

        handle
            .track(PresenceMeta { display_name: self.identity.display_name.clone() })
            .await?;
        self.announced = true;
        self.room_full = snapshot.len() + 1 >= ROOM_CAPACITY;
        Ok(())
    }

    /// Next event from either subscription, serialized onto one queue.
    ///
    /// An exhausted substrate is dropped and the survivor keeps delivering;
    /// `None` means the session is closed or both substrates went away. A
    /// closed channel is permanently ready, so polling it alongside a live
    /// one would starve the live events.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if self.state != SessionState::Ready {
                return None;
            }

            let polled = match (self.inserts.as_mut(), self.presence_handle.as_mut()) {
                (None, None) => return None,
                (Some(inserts), None) => Polled::Insert(inserts.recv().await),
                (None, Some(presence)) => Polled::Sync(presence.next_sync().await),
                (Some(inserts), Some(presence)) => tokio::select! {
                    row = inserts.recv() => Polled::Insert(row),
                    snapshot = presence.next_sync() => Polled::Sync(snapshot),
                },
            };

            match polled {
                Polled::Insert(Some(row)) => return Some(SessionEvent::MessageInserted(row)),
                Polled::Sync(Some(snapshot)) => {
                    return Some(SessionEvent::PresenceSynced(snapshot));
                },
                Polled::Insert(None) => self.inserts = None,
                Polled::Sync(None) => self.presence_handle = None,
            }
        }
    }

    /// Apply one inbound event.
    ///
    /// A session that is not `Ready` drops events on the floor; in
    /// particular a closed session must not mutate UI-visible state.
    pub fn handle_event(&mut self, event: SessionEvent) {
        if self.state != SessionState::Ready {
            tracing::debug!(room_key = %self.room_key, "event dropped outside ready state");
            return;
        }

        match event {
            SessionEvent::MessageInserted(row) => {
                // Append in arrival order; out-of-order delivery is
                // tolerated, not corrected, and duplicates are kept.
                let message = match self.cipher.as_ref() {
                    Some(cipher) => decrypt_row(cipher, row),
                    None => Message::from_stored(row, MessageBody::Undecipherable),
                };
                self.messages.push(message);
            },
            SessionEvent::PresenceSynced(snapshot) => {
                self.roster = Roster::from_snapshot(&snapshot, &self.host);
                // A reader that never announced stays read-only when the
                // room drains; `announce` is what lifts the restriction.
                if self.announced || self.is_host() {
                    self.room_full = self.roster.full;
                } else if self.roster.full {
                    self.room_full = true;
                }
            },
        }
    }

    /// Seal `text` and append it to the room, tagged with this client's id.
    ///
    /// # Errors
    ///
    /// Guard rejections ([`SessionError::NotReady`],
    /// [`SessionError::EmptyMessage`], [`SessionError::SendInFlight`],
    /// [`SessionError::RoomFull`]) happen before any store call. Store
    /// failures are surfaced and not retried; the in-flight flag is cleared
    /// on every path.
    pub async fn send_message(&mut self, text: &str) -> Result<(), SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::NotReady);
        }
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self.sending {
            return Err(SessionError::SendInFlight);
        }
        if self.room_full && !self.is_host() {
            return Err(SessionError::RoomFull);
        }

        self.sending = true;
        let result = self.send_inner(text).await;
        self.sending = false;
        result
    }

    async fn send_inner(&self, text: &str) -> Result<(), SessionError> {
        let cipher = self.cipher.as_ref().ok_or(SessionError::NotReady)?;
        let sealed = cipher.encrypt(text)?;

        self.store.append_message(&self.room_key, &self.identity.client_id, &sealed).await?;
        Ok(())
    }

    /// Tear the session down: drop both subscriptions and stop delivering
    /// events. Terminal; safe to call more than once.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        // Dropping the handles unsubscribes; the presence entry vanishes
        // with the handle.
        self.inserts = None;
        self.presence_handle = None;
        self.state = SessionState::Closed;
        tracing::debug!(room_key = %self.room_key, "session closed");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Messages in arrival order, decrypted where possible.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current roster as of the latest presence sync.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// True until the session reaches a settled state.
    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            SessionState::Unvalidated | SessionState::Checking | SessionState::Loading
        )
    }

    /// True while a send is in flight.
    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Whether the room row was found (or created) for this key.
    pub fn room_exists(&self) -> bool {
        matches!(self.state, SessionState::Loading | SessionState::Ready)
    }

    /// Whether the room was found at capacity.
    pub fn room_full(&self) -> bool {
        self.room_full
    }

    /// Whether this session announced its presence. False for a reader
    /// refused at capacity.
    pub fn announced(&self) -> bool {
        self.announced
    }

    /// Whether this client is the room's elected host.
    pub fn is_host(&self) -> bool {
        self.host.is_host(&self.identity.client_id)
    }

    /// How the host was determined.
    pub fn host_policy(&self) -> &HostPolicy {
        &self.host
    }

    /// This session's pseudo-identity.
    pub fn client_id(&self) -> &str {
        &self.identity.client_id
    }

    /// The room key this session is bound to.
    pub fn room_key(&self) -> &str {
        &self.room_key
    }
}

/// One substrate poll outcome: a delivered event, or channel exhaustion.
enum Polled {
    Insert(Option<StoredMessage>),
    Sync(Option<PresenceSnapshot>),
}

/// Decrypt one stored row, degrading to a placeholder on failure.
///
/// One undecipherable message never aborts loading the rest.
fn decrypt_row(cipher: &RoomCipher, row: StoredMessage) -> Message {
    let body = match cipher.decrypt(&row.ciphertext) {
        Ok(text) => MessageBody::Clear(text),
        Err(e) => {
            tracing::warn!(message_id = row.id, error = %e, "undecipherable message");
            MessageBody::Undecipherable
        },
    };
    Message::from_stored(row, body)
}
