use std::sync::Arc;
use std::time::Duration;

use plane_types::{BoundingBox, TrackedObject};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::broadcast::{publish, PublishReport};
use crate::enrichment::EnrichmentPolicy;
use crate::feed::{parse_position, FeedSource};
use crate::state::SharedWorld;

// ─── Cycle Result ─────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Feed returned nothing; the previous planes stay on screen.
    Skipped,
    /// A new plane set was installed and broadcast.
    Published {
        planes: usize,
        discarded: usize,
        report: PublishReport,
    },
}

// ─── Refresh Loop ─────────────────────────────────────────────────────────────

/// Periodic fetch → enrich → replace → broadcast.
pub struct RefreshLoop {
    world: SharedWorld,
    feed: Arc<dyn FeedSource>,
    policy: Arc<dyn EnrichmentPolicy>,
    bbox: BoundingBox,
    period: Duration,
}

impl RefreshLoop {
    pub fn new(
        world: SharedWorld,
        feed: Arc<dyn FeedSource>,
        policy: Arc<dyn EnrichmentPolicy>,
        bbox: BoundingBox,
        period: Duration,
    ) -> Self {
        // `interval` panics on a zero period
        let period = period.max(Duration::from_millis(1));
        Self { world, feed, policy, bbox, period }
    }

    /// Run one refresh cycle.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let raw = self.feed.fetch(self.bbox).await;
        if raw.is_empty() {
            return CycleOutcome::Skipped;
        }

        let total = raw.len();
        let planes: Vec<TrackedObject> = raw
            .iter()
            .filter_map(|record| parse_position(record))
            .map(|pos| {
                let provenance = self.policy.enrich(pos.lon, pos.lat);
                TrackedObject::new(pos.id, pos.lat, pos.lon, pos.altitude, provenance)
            })
            .collect();
        let discarded = total - planes.len();

        let installed = self.world.replace_tracked_objects(planes).await;
        let report = publish(&self.world).await;

        CycleOutcome::Published { planes: installed, discarded, report }
    }

    /// Loop until `shutdown` flips to `true` or its sender is dropped. The first cycle
    /// runs immediately; an in-flight fetch is abandoned on shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("🛫 Refresh loop started ({:?} period)", self.period);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let ticked = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    false
                }
                _ = ticker.tick() => true,
            };
            if *shutdown.borrow() {
                break;
            }
            if !ticked {
                continue;
            }

            let outcome = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    None
                }
                outcome = self.run_cycle() => Some(outcome),
            };
            let Some(outcome) = outcome else {
                continue;
            };

            match outcome {
                CycleOutcome::Skipped => debug!("Refresh: no feed data this cycle"),
                CycleOutcome::Published { planes, discarded, report } => info!(
                    "📡 Refresh: {planes} planes ({discarded} incomplete discarded) → {} clients",
                    report.delivered
                ),
            }
        }

        info!("Refresh loop stopped");
    }
}
