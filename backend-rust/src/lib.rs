//! # Plane Game backend
//!
//! Real-time state-broadcast server for a multiplayer "guess where that plane is going"
//! game. Clients hold a WebSocket open; the server keeps one shared world (live
//! aircraft, player scores, a game-mode flag) and pushes a full snapshot to every
//! client after each change.
//!
//! Three things mutate the world concurrently:
//! - the refresh loop ([`refresh`]) replacing the aircraft set from the flight feed
//!   every few seconds,
//! - connection handlers ([`handlers`]) applying guesses and mode toggles,
//! - clients connecting and disconnecting.
//!
//! All of them go through [`state::WorldState`], a single `RwLock`-guarded aggregate
//! that also owns the client registry. [`broadcast::publish`] takes one snapshot under
//! that lock and queues the same serialized frame for each client without awaiting
//! any socket, so a stalled client cannot hold up the rest.

pub mod broadcast;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod refresh;
pub mod server;
pub mod state;

pub use config::{EnrichmentKind, ServerConfig};
pub use refresh::RefreshLoop;
pub use server::{build_router, AppState};
pub use state::{SharedWorld, WorldState};
