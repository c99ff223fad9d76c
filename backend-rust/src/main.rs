use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use planegame_backend::enrichment::policy_for;
use planegame_backend::feed::OpenSkyFeed;
use planegame_backend::{server, AppState, EnrichmentKind, RefreshLoop, ServerConfig, WorldState};

// ─── CLI ──────────────────────────────────────────────────────────────────────

/// Flags override the matching environment variables.
#[derive(Parser, Debug)]
#[command(name = "planegame-backend", about = "Plane Game state-broadcast server")]
struct Args {
    /// Interface to bind [env: HOST]
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on [env: PORT]
    #[arg(short, long)]
    port: Option<u16>,
    /// Latitude of the watched area [env: CENTER_LAT]
    #[arg(long, allow_hyphen_values = true)]
    center_lat: Option<f64>,
    /// Longitude of the watched area [env: CENTER_LON]
    #[arg(long, allow_hyphen_values = true)]
    center_lon: Option<f64>,
    /// Half-width of the watched area in degrees [env: BBOX_RADIUS_DEG]
    #[arg(long)]
    radius: Option<f64>,
    /// Seconds between feed refreshes [env: REFRESH_INTERVAL_SECS]
    #[arg(long)]
    refresh_secs: Option<u64>,
    /// Origin/destination labelling [env: ENRICHMENT]
    #[arg(long, value_enum)]
    enrichment: Option<EnrichmentKind>,
}

impl Args {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(lat) = self.center_lat {
            config.center_lat = lat;
        }
        if let Some(lon) = self.center_lon {
            config.center_lon = lon;
        }
        if let Some(radius) = self.radius {
            config.bbox_radius_deg = radius;
        }
        if let Some(secs) = self.refresh_secs {
            config.refresh_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(kind) = self.enrichment {
            config.enrichment = kind;
        }
        config
    }
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "planegame_backend=info,tower_http=warn".into()),
        )
        .init();

    let config = Args::parse().apply(ServerConfig::default());
    info!("✈️  Plane Game backend starting...");
    info!(
        "Watching {:?} via {} every {:?} ({:?} labels)",
        config.bounding_box(),
        config.feed_url,
        config.refresh_interval,
        config.enrichment
    );

    let world = Arc::new(WorldState::new());
    let feed = Arc::new(OpenSkyFeed::new(&config.feed_url, config.feed_timeout)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start refresh loop
    let refresh = RefreshLoop::new(
        world.clone(),
        feed,
        policy_for(config.enrichment),
        config.bounding_box(),
        config.refresh_interval,
    );
    let refresh_task = tokio::spawn(refresh.run(shutdown_rx.clone()));

    let addr = config.bind_addr();
    let listener = server::bind(&addr).await?;
    info!("🚀 Listening on {addr} (WebSocket at /ws)");

    tokio::spawn(server::shutdown_on(tokio::signal::ctrl_c(), shutdown_tx));

    server::serve(listener, AppState::new(world, &config), shutdown_rx).await?;
    refresh_task.await?;

    info!("Bye");
    Ok(())
}
