//! Fan-out of world snapshots to connected clients.
//!
//! A publish serializes the snapshot once and pushes the same frame into every
//! client's bounded outbound queue with `try_send`, all under the world read lock.
//! Nothing here awaits a socket: a client whose queue is full or whose writer has
//! gone away is reported as dropped and unregistered, and the rest still receive
//! the frame.

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::state::{ClientId, ClientSender, Frame, WorldState};

/// Per-publish delivery result.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Clients that had the frame queued
    pub delivered: usize,
    /// Clients removed from the registry because the frame could not be queued
    pub dropped: Vec<ClientId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Queued,
    Lagging,
    Gone,
}

fn deliver(id: ClientId, sender: &ClientSender, frame: &Frame) -> Delivery {
    match sender.try_send(frame.clone()) {
        Ok(()) => Delivery::Queued,
        Err(TrySendError::Full(_)) => {
            warn!("Client {id}: outbound queue full, dropping slow client");
            Delivery::Lagging
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Client {id}: writer closed, dropping");
            Delivery::Gone
        }
    }
}

/// Send the current snapshot to every registered client.
pub async fn publish(world: &WorldState) -> PublishReport {
    let mut report = PublishReport::default();

    {
        let guard = world.read().await;
        if !guard.has_clients() {
            return report;
        }

        let frame: Frame = match guard.snapshot().to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                warn!("Failed to serialize world snapshot: {e}");
                return report;
            }
        };

        for (id, sender) in guard.clients() {
            match deliver(id, sender, &frame) {
                Delivery::Queued => report.delivered += 1,
                Delivery::Lagging | Delivery::Gone => report.dropped.push(id),
            }
        }
    }

    for id in &report.dropped {
        world.unregister(*id).await;
    }

    report
}

/// Send the current snapshot to one client only (used right after it connects).
/// Returns `false` if the client is unknown or its queue rejected the frame.
pub async fn send_current(world: &WorldState, id: ClientId) -> bool {
    let delivery = {
        let guard = world.read().await;
        let Some(sender) = guard.sender(id) else {
            return false;
        };

        let frame: Frame = match guard.snapshot().to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                warn!("Failed to serialize world snapshot: {e}");
                return false;
            }
        };
        deliver(id, sender, &frame)
    };

    if delivery == Delivery::Queued {
        true
    } else {
        world.unregister(id).await;
        false
    }
}
