//! # enrichment
//!
//! Provenance labels for tracked planes.
//!
//! The feed only gives positions, so the origin/destination pair players guess at
//! comes from a pluggable [`EnrichmentPolicy`]. Scoring is judged against whatever
//! label the policy assigned at refresh time, never against ground truth, so a
//! policy is free to be approximate.

use std::sync::Arc;

use plane_types::Provenance;
use rand::seq::SliceRandom;

use crate::config::EnrichmentKind;

/// Pure `(lon, lat) -> (origin, destination)` labelling. No I/O.
pub trait EnrichmentPolicy: Send + Sync {
    fn enrich(&self, lon: f64, lat: f64) -> Provenance;
}

// ── Airport tables ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Airport {
    pub code: &'static str,
    pub lat: f64,
    pub lon: f64,
}

/// Candidate departure airports around the default watch area.
pub const ORIGIN_AIRPORTS: &[Airport] = &[
    Airport { code: "JFK", lat: 40.6413, lon: -73.7781 },
    Airport { code: "LGA", lat: 40.7769, lon: -73.8740 },
    Airport { code: "EWR", lat: 40.6895, lon: -74.1745 },
];

/// Candidate arrival airports.
pub const DESTINATION_AIRPORTS: &[Airport] = &[
    Airport { code: "LAX", lat: 33.9416, lon: -118.4085 },
    Airport { code: "ORD", lat: 41.9742, lon: -87.9073 },
    Airport { code: "ATL", lat: 33.6407, lon: -84.4277 },
    Airport { code: "MIA", lat: 25.7959, lon: -80.2870 },
    Airport { code: "DFW", lat: 32.8998, lon: -97.0403 },
];

// ── Random placeholder ────────────────────────────────────────────────────────

/// Uniformly random labels. Position is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomAirportPolicy;

impl EnrichmentPolicy for RandomAirportPolicy {
    fn enrich(&self, _lon: f64, _lat: f64) -> Provenance {
        let mut rng = rand::thread_rng();
        let pick = |table: &[Airport], rng: &mut rand::rngs::ThreadRng| {
            table.choose(rng).map(|a| a.code).unwrap_or("UNK").to_string()
        };
        Provenance {
            origin: pick(ORIGIN_AIRPORTS, &mut rng),
            destination: pick(DESTINATION_AIRPORTS, &mut rng),
        }
    }
}

// ── Nearest airport ───────────────────────────────────────────────────────────

/// Deterministic labels: the closest origin airport and the closest destination
/// airport to the plane's current position.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestAirportPolicy;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

fn nearest(table: &[Airport], lat: f64, lon: f64) -> &'static str {
    table
        .iter()
        .map(|a| (a.code, haversine_km(lat, lon, a.lat, a.lon)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(code, _)| code)
        .unwrap_or("UNK")
}

impl EnrichmentPolicy for NearestAirportPolicy {
    fn enrich(&self, lon: f64, lat: f64) -> Provenance {
        Provenance {
            origin: nearest(ORIGIN_AIRPORTS, lat, lon).to_string(),
            destination: nearest(DESTINATION_AIRPORTS, lat, lon).to_string(),
        }
    }
}

pub fn policy_for(kind: EnrichmentKind) -> Arc<dyn EnrichmentPolicy> {
    match kind {
        EnrichmentKind::Random => Arc::new(RandomAirportPolicy),
        EnrichmentKind::Nearest => Arc::new(NearestAirportPolicy),
    }
}
