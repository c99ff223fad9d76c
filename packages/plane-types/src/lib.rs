//! # plane-types
//!
//! Wire vocabulary for the plane guessing game.
//!
//! These types are used by:
//! - `backend-rust`: the state-broadcast server (encodes snapshots, decodes client actions)
//! - the web front end and radar display: passive consumers that only decode [`WorldSnapshot`]
//!
//! ## Wire shape
//!
//! Client → server (JSON text frames):
//! ```text
//! { "type": "guess", "player": "...", "planeId": "...", "airport": "..." }
//! { "type": "toggleGameMode" }
//! ```
//!
//! Server → client (after every state change and every refresh cycle):
//! ```text
//! { "activePlanes": { "<id>": { id, lat, lon, altitude, origin, destination } },
//!   "scores": { "<player>": n },
//!   "gameMode": bool }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Geography ─────────────────────────────────────────────────────────────────

/// Rectangular lat/lon region the flight feed is queried for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Square box of `radius_deg` degrees on each side of a centre point.
    pub fn around(center_lat: f64, center_lon: f64, radius_deg: f64) -> Self {
        Self {
            lat_min: center_lat - radius_deg,
            lat_max: center_lat + radius_deg,
            lon_min: center_lon - radius_deg,
            lon_max: center_lon + radius_deg,
        }
    }
}

// ── Tracked Objects ───────────────────────────────────────────────────────────

/// Origin/destination label pair assigned by an enrichment policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub origin: String,
    pub destination: String,
}

/// One aircraft currently visible in the bounding box.
///
/// Replaced wholesale on every refresh cycle, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    /// Callsign, trimmed. Unique within one snapshot.
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// Barometric altitude in meters
    pub altitude: f64,
    pub origin: String,
    pub destination: String,
}

impl TrackedObject {
    pub fn new(id: impl Into<String>, lat: f64, lon: f64, altitude: f64, provenance: Provenance) -> Self {
        Self {
            id: id.into(),
            lat,
            lon,
            altitude,
            origin: provenance.origin,
            destination: provenance.destination,
        }
    }
}

// ── Broadcast Payload ─────────────────────────────────────────────────────────

/// Point-in-time copy of the whole game world, sent identically to every client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub active_planes: HashMap<String, TrackedObject>,
    pub scores: HashMap<String, u64>,
    pub game_mode: bool,
}

impl WorldSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Client Actions ────────────────────────────────────────────────────────────

/// Inbound message from a player.
///
/// Unknown `type` tags decode to [`ClientAction::Unknown`] so newer clients can talk
/// to older servers. A frame without a `type`, or a known type with missing fields,
/// fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientAction {
    Guess {
        player: String,
        #[serde(rename = "planeId")]
        plane_id: String,
        airport: String,
    },
    ToggleGameMode,
    #[serde(other)]
    Unknown,
}

impl ClientAction {
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
