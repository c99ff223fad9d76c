//! # feed
//!
//! Flight position feed. Queries an OpenSky-compatible `states/all` endpoint for the
//! configured bounding box and hands the positional state vectors to the refresh loop.
//!
//! ## Contract
//! - Every failure (transport, HTTP status, bad JSON, no `states` field) is logged here
//!   and surfaces only as an empty batch. The refresh loop never sees an error.
//! - `states: null` is OpenSky's way of saying "no aircraft" and is also an empty batch.
//! - Records are positional arrays; [`parse_position`] picks out the fields the game
//!   needs and rejects records where any of them is absent.

use std::time::Duration;

use async_trait::async_trait;
use plane_types::BoundingBox;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FeedError;

/// One state vector exactly as the provider sent it.
pub type RawStateVector = Vec<Value>;

// OpenSky state vector layout
const IDX_CALLSIGN: usize = 1;
const IDX_LONGITUDE: usize = 5;
const IDX_LATITUDE: usize = 6;
const IDX_BARO_ALTITUDE: usize = 7;

/// Source of raw aircraft records for a region.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current records inside `bbox`. Empty on any failure.
    async fn fetch(&self, bbox: BoundingBox) -> Vec<RawStateVector>;
}

// ── Parsed position ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PlanePosition {
    pub id: String,
    pub lon: f64,
    pub lat: f64,
    pub altitude: f64,
}

/// Extract id/lon/lat/altitude from a state vector. `None` if any is missing, null,
/// or the wrong type; a blank callsign counts as missing.
pub fn parse_position(raw: &[Value]) -> Option<PlanePosition> {
    let id = raw.get(IDX_CALLSIGN)?.as_str()?.trim();
    if id.is_empty() {
        return None;
    }

    Some(PlanePosition {
        id: id.to_string(),
        lon: raw.get(IDX_LONGITUDE)?.as_f64()?,
        lat: raw.get(IDX_LATITUDE)?.as_f64()?,
        altitude: raw.get(IDX_BARO_ALTITUDE)?.as_f64()?,
    })
}

/// Decode a `states/all` response body into its state vectors.
pub fn parse_states(body: &str) -> Result<Vec<RawStateVector>, FeedError> {
    let mut doc: Value = serde_json::from_str(body)?;

    let states = match doc.get_mut("states").map(Value::take) {
        None => return Err(FeedError::MissingStates),
        Some(Value::Null) => return Ok(Vec::new()),
        Some(states) => states,
    };

    let entries: Vec<Value> = serde_json::from_value(states)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Array(fields) => Some(fields),
            _ => None,
        })
        .collect())
}

// ── OpenSky HTTP client ───────────────────────────────────────────────────────

pub struct OpenSkyFeed {
    client: reqwest::Client,
    url: Url,
}

impl OpenSkyFeed {
    /// The URL is validated here so a typo fails at startup, not on every cycle.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let url = Url::parse(url).map_err(|e| FeedError::InvalidUrl(format!("{url}: {e}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    fn request_url(&self, bbox: BoundingBox) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("lamin", &bbox.lat_min.to_string())
            .append_pair("lamax", &bbox.lat_max.to_string())
            .append_pair("lomin", &bbox.lon_min.to_string())
            .append_pair("lomax", &bbox.lon_max.to_string());
        url
    }

    async fn fetch_states(&self, bbox: BoundingBox) -> Result<Vec<RawStateVector>, FeedError> {
        let response = self.client.get(self.request_url(bbox)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_states(&body)
    }
}

#[async_trait]
impl FeedSource for OpenSkyFeed {
    async fn fetch(&self, bbox: BoundingBox) -> Vec<RawStateVector> {
        match self.fetch_states(bbox).await {
            Ok(states) => {
                debug!("Feed: {} state vectors", states.len());
                states
            }
            Err(e) => {
                warn!("Feed unavailable, keeping last known planes: {e}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn state(callsign: Value, lon: Value, lat: Value, alt: Value) -> Vec<Value> {
        vec![json!("abc123"), callsign, json!("United States"), json!(1), json!(1), lon, lat, alt]
    }

    #[test]
    fn parses_complete_record_and_trims_callsign() {
        let raw = state(json!("AAL123  "), json!(-73.9), json!(40.7), json!(3048));
        assert_eq!(
            parse_position(&raw),
            Some(PlanePosition { id: "AAL123".into(), lon: -73.9, lat: 40.7, altitude: 3048.0 })
        );
    }

    #[test]
    fn record_missing_altitude_is_rejected() {
        let null_alt = state(json!("AAL123"), json!(-73.9), json!(40.7), Value::Null);
        assert_eq!(parse_position(&null_alt), None);

        let short = state(json!("AAL123"), json!(-73.9), json!(40.7), Value::Null)[..7].to_vec();
        assert_eq!(parse_position(&short), None);
    }

    #[test]
    fn record_with_blank_or_null_callsign_is_rejected() {
        assert_eq!(parse_position(&state(json!("   "), json!(1.0), json!(2.0), json!(3.0))), None);
        assert_eq!(parse_position(&state(Value::Null, json!(1.0), json!(2.0), json!(3.0))), None);
        assert_eq!(parse_position(&state(json!("X1"), json!("east"), json!(2.0), json!(3.0))), None);
    }

    #[test]
    fn parse_states_handles_null_and_missing() {
        assert!(parse_states(r#"{"time":1,"states":null}"#).unwrap().is_empty());
        assert!(matches!(parse_states(r#"{"time":1}"#), Err(FeedError::MissingStates)));
        assert!(matches!(parse_states("<html>"), Err(FeedError::Decode(_))));
    }

    #[test]
    fn parse_states_skips_non_array_entries() {
        let body = json!({
            "time": 1,
            "states": [
                state(json!("AAL1"), json!(1.0), json!(2.0), json!(3.0)),
                "garbage",
            ]
        })
        .to_string();
        let states = parse_states(&body).unwrap();
        assert_eq!(states.len(), 1);
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn fetch_sends_bounding_box_query() {
        let router = Router::new().route(
            "/api/states/all",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let lamin: f64 = q["lamin"].parse().unwrap();
                let lomax: f64 = q["lomax"].parse().unwrap();
                Json(json!({
                    "time": 1,
                    "states": [[ "a1", "ECHO1", "X", 1, 1, lomax, lamin, 1000.0 ]]
                }))
            }),
        );
        let base = serve(router).await;

        let feed = OpenSkyFeed::new(&format!("{base}/api/states/all"), Duration::from_secs(5)).unwrap();
        let states = feed.fetch(BoundingBox::around(40.0, -74.0, 1.0)).await;

        assert_eq!(states.len(), 1);
        let pos = parse_position(&states[0]).unwrap();
        assert_eq!(pos.lat, 39.0);
        assert_eq!(pos.lon, -73.0);
    }

    #[tokio::test]
    async fn fetch_swallows_http_errors() {
        let router = Router::new().route(
            "/api/states/all",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = serve(router).await;

        let feed = OpenSkyFeed::new(&format!("{base}/api/states/all"), Duration::from_secs(5)).unwrap();
        assert!(feed.fetch(BoundingBox::around(0.0, 0.0, 1.0)).await.is_empty());
    }

    #[tokio::test]
    async fn fetch_swallows_unreachable_host() {
        let feed = OpenSkyFeed::new("http://127.0.0.1:9/states/all", Duration::from_secs(1)).unwrap();
        assert!(feed.fetch(BoundingBox::around(0.0, 0.0, 1.0)).await.is_empty());
    }

    #[test]
    fn invalid_feed_url_is_rejected_up_front() {
        let err = OpenSkyFeed::new("not a url", Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, FeedError::InvalidUrl(_)));
    }

    #[test]
    fn request_url_keeps_existing_query() {
        let feed = OpenSkyFeed::new("https://example.test/states/all?extended=1", Duration::from_secs(1)).unwrap();
        let url = feed.request_url(BoundingBox::around(10.0, 20.0, 0.5));
        assert_eq!(
            url.query(),
            Some("extended=1&lamin=9.5&lamax=10.5&lomin=19.5&lomax=20.5")
        );
    }
}
