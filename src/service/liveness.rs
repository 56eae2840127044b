//! Liveness monitor: evicts connections that stopped talking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::domain::ConnectionRegistry;

/// Periodic sweep over the registry.
///
/// The sweep period is independent of the client heartbeat period; the
/// staleness threshold lives on the registry.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
}

impl LivenessMonitor {
    /// Creates a monitor sweeping `registry` every `interval`.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Evicts and closes every connection stale at `now`.
    ///
    /// Returns the number of evicted connections.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let evicted = self.registry.evict_stale(now).await;
        for entry in &evicted {
            tracing::info!(
                connection_id = %entry.connection_id,
                username = %entry.username,
                last_acknowledged = %entry.last_acknowledged,
                "evicting stale connection"
            );
            entry.transport.close();
        }
        evicted.len()
    }

    /// Spawns the sweep loop on the current runtime.
    ///
    /// The first sweep runs one full interval after start. Abort the
    /// returned handle to stop it.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = self.sweep_at(Utc::now()).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "liveness sweep complete");
                }
            }
        })
    }
}
