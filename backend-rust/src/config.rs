use std::time::Duration;

use plane_types::BoundingBox;

// ── Enrichment selection ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum EnrichmentKind {
    /// Random origin/destination labels (the game's original behaviour)
    #[default]
    Random,
    /// Nearest known airport, deterministic
    Nearest,
}

impl EnrichmentKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "random" => Some(Self::Random),
            "nearest" => Some(Self::Nearest),
            _ => None,
        }
    }
}

// ── Server configuration ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind (default 0.0.0.0)
    pub host: String,
    /// TCP port for HTTP + WebSocket (default 8000)
    pub port: u16,
    /// Centre of the watched area
    pub center_lat: f64,
    pub center_lon: f64,
    /// Half-width of the watched area in degrees (default 1.0)
    pub bbox_radius_deg: f64,
    /// OpenSky-compatible `states/all` endpoint
    pub feed_url: String,
    pub feed_timeout: Duration,
    /// Period of the refresh loop (default 5 s)
    pub refresh_interval: Duration,
    /// Outbound frames queued per client before it counts as too slow
    pub client_buffer: usize,
    /// Upper bound on a single WebSocket write
    pub send_timeout: Duration,
    pub enrichment: EnrichmentKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT").unwrap_or(8000),
            center_lat: env_parse("CENTER_LAT").unwrap_or(0.0),
            center_lon: env_parse("CENTER_LON").unwrap_or(0.0),
            bbox_radius_deg: env_parse("BBOX_RADIUS_DEG").unwrap_or(1.0),
            feed_url: std::env::var("FEED_URL")
                .unwrap_or_else(|_| "https://opensky-network.org/api/states/all".to_string()),
            feed_timeout: Duration::from_secs(env_parse("FEED_TIMEOUT_SECS").unwrap_or(10)),
            refresh_interval: Duration::from_secs(env_parse("REFRESH_INTERVAL_SECS").unwrap_or(5).max(1)),
            client_buffer: env_parse("CLIENT_BUFFER").unwrap_or(32),
            send_timeout: Duration::from_millis(env_parse("SEND_TIMEOUT_MS").unwrap_or(2000)),
            enrichment: std::env::var("ENRICHMENT")
                .ok()
                .and_then(|v| EnrichmentKind::parse(&v))
                .unwrap_or_default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::around(self.center_lat, self.center_lon, self.bbox_radius_deg)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrichment_kind_parses_case_insensitively() {
        assert_eq!(EnrichmentKind::parse("Nearest"), Some(EnrichmentKind::Nearest));
        assert_eq!(EnrichmentKind::parse(" random "), Some(EnrichmentKind::Random));
        assert_eq!(EnrichmentKind::parse("oracle"), None);
    }

    #[test]
    fn bounding_box_follows_center_and_radius() {
        let config = ServerConfig {
            center_lat: 40.7,
            center_lon: -73.9,
            bbox_radius_deg: 0.5,
            ..ServerConfig::default()
        };
        let bbox = config.bounding_box();
        assert!((bbox.lat_min - 40.2).abs() < 1e-9);
        assert!((bbox.lon_max + 73.4).abs() < 1e-9);
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 9001,
            ..ServerConfig::default()
        };
        assert_eq!(config.bind_addr(), "127.0.0.1:9001");
    }
}
