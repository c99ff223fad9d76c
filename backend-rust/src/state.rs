//! # state
//!
//! The single shared game world: tracked aircraft, player scores, the game-mode flag,
//! and the registry of connected clients.
//!
//! All fields sit behind one `RwLock`, so a mutation from a client handler and a
//! replacement from the refresh loop can never interleave, and a snapshot is always
//! taken from one consistent instant. The registry lives under the same lock so the
//! broadcaster can serialize a snapshot and fan it out without the membership
//! changing underneath it.

use std::collections::HashMap;
use std::sync::Arc;

use plane_types::{TrackedObject, WorldSnapshot};
use tokio::sync::{mpsc, oneshot, RwLock, RwLockReadGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Identity of one WebSocket connection, unique for the lifetime of the process.
pub type ClientId = Uuid;

/// A serialized snapshot, shared between every client queue it is pushed to.
pub type Frame = Arc<str>;

/// Outbound half of a client: frames pushed here are written by that client's writer task.
pub type ClientSender = mpsc::Sender<Frame>;

/// Resolves once the client leaves the registry, whoever removed it.
pub type Eviction = oneshot::Receiver<()>;

struct ClientEntry {
    sender: ClientSender,
    // Dropping this wakes the matching `Eviction`.
    _evict: oneshot::Sender<()>,
}

// ─── World ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct World {
    planes: HashMap<String, TrackedObject>,
    scores: HashMap<String, u64>,
    game_mode: bool,
    clients: HashMap<ClientId, ClientEntry>,
}

impl World {
    pub(crate) fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            active_planes: self.planes.clone(),
            scores: self.scores.clone(),
            game_mode: self.game_mode,
        }
    }

    pub(crate) fn has_clients(&self) -> bool {
        !self.clients.is_empty()
    }

    pub(crate) fn clients(&self) -> impl Iterator<Item = (ClientId, &ClientSender)> + '_ {
        self.clients.iter().map(|(id, entry)| (*id, &entry.sender))
    }

    pub(crate) fn sender(&self, id: ClientId) -> Option<&ClientSender> {
        self.clients.get(&id).map(|entry| &entry.sender)
    }

    fn apply_guess(&mut self, player: &str, plane_id: &str, airport: &str) -> bool {
        let matched = self
            .planes
            .get(plane_id)
            .is_some_and(|plane| plane.destination == airport);

        if matched {
            let score = self.scores.entry(player.to_string()).or_insert(0);
            *score += 1;
            info!("🎯 {player} guessed {plane_id} → {airport} (score {score})");
        } else {
            debug!("{player} missed on {plane_id} with {airport}");
        }

        matched
    }

    fn toggle_game_mode(&mut self) -> bool {
        self.game_mode = !self.game_mode;
        self.game_mode
    }
}

// ─── WorldState ───────────────────────────────────────────────────────────────

/// Owner of the [`World`]. Constructed once at startup and handed to every task as
/// `Arc<WorldState>`.
#[derive(Default)]
pub struct WorldState {
    inner: RwLock<World>,
}

pub type SharedWorld = Arc<WorldState>;

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score a guess against the plane's current destination label.
    ///
    /// A plane that has rotated out since the client last saw it is simply a miss.
    pub async fn apply_guess(&self, player: &str, plane_id: &str, airport: &str) -> bool {
        self.inner.write().await.apply_guess(player, plane_id, airport)
    }

    /// Flip the game-mode flag, returning the new value.
    pub async fn toggle_game_mode(&self) -> bool {
        self.inner.write().await.toggle_game_mode()
    }

    /// [`apply_guess`](Self::apply_guess) on behalf of a connection. `None`, with the
    /// world untouched, if `client` is no longer registered.
    pub async fn guess_as(
        &self,
        client: ClientId,
        player: &str,
        plane_id: &str,
        airport: &str,
    ) -> Option<bool> {
        let mut world = self.inner.write().await;
        if !world.clients.contains_key(&client) {
            return None;
        }
        Some(world.apply_guess(player, plane_id, airport))
    }

    /// [`toggle_game_mode`](Self::toggle_game_mode) on behalf of a connection. `None`,
    /// with the flag untouched, if `client` is no longer registered.
    pub async fn toggle_as(&self, client: ClientId) -> Option<bool> {
        let mut world = self.inner.write().await;
        if !world.clients.contains_key(&client) {
            return None;
        }
        Some(world.toggle_game_mode())
    }

    /// Swap in a fresh set of planes. Later entries win on duplicate ids.
    /// Returns the number of planes now tracked.
    pub async fn replace_tracked_objects<I>(&self, planes: I) -> usize
    where
        I: IntoIterator<Item = TrackedObject>,
    {
        let fresh: HashMap<String, TrackedObject> =
            planes.into_iter().map(|p| (p.id.clone(), p)).collect();
        let count = fresh.len();

        self.inner.write().await.planes = fresh;
        count
    }

    pub async fn snapshot(&self) -> WorldSnapshot {
        self.inner.read().await.snapshot()
    }

    /// Add a connection to the registry. The returned [`Eviction`] resolves when the
    /// connection is removed again, so its handler can stop reading.
    ///
    /// # Panics
    /// If `id` is already registered. Ids are fresh UUIDs, so this is a bug.
    pub async fn register(&self, id: ClientId, sender: ClientSender) -> Eviction {
        let (evict, eviction) = oneshot::channel();
        let mut world = self.inner.write().await;
        let previous = world.clients.insert(id, ClientEntry { sender, _evict: evict });
        assert!(previous.is_none(), "client {id} registered twice");
        info!("Client registered: {id} ({} connected)", world.clients.len());
        eviction
    }

    /// Remove a connection. Removing an absent id is a no-op; returns whether it was present.
    pub async fn unregister(&self, id: ClientId) -> bool {
        let mut world = self.inner.write().await;
        let removed = world.clients.remove(&id).is_some();
        if removed {
            info!("Client unregistered: {id} ({} connected)", world.clients.len());
        }
        removed
    }

    pub async fn is_registered(&self, id: ClientId) -> bool {
        self.inner.read().await.clients.contains_key(&id)
    }

    pub async fn client_count(&self) -> usize {
        self.inner.read().await.clients.len()
    }

    /// Drop every client entry. Each handler stops reading, its writer drains what is
    /// queued and closes the socket. Returns how many clients were registered.
    pub async fn close_all(&self) -> usize {
        let mut world = self.inner.write().await;
        let count = world.clients.len();
        world.clients.clear();
        count
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, World> {
        self.inner.read().await
    }
}
