use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use net::protocol::ServerMessage;
use net::web_server::wait_for_shutdown;
use observability::SweepMetrics;
use player_db::Repository;
use session::SessionRegistry;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Periodically reactivates defeated NPCs whose respawn delay has elapsed.
pub struct RespawnScheduler {
    repo: Arc<dyn Repository>,
    registry: Arc<SessionRegistry>,
    period: Duration,
}

impl RespawnScheduler {
    pub fn new(repo: Arc<dyn Repository>, registry: Arc<SessionRegistry>, period: Duration) -> Self {
        Self {
            repo,
            registry,
            period,
        }
    }

    /// One pass. Only NPCs this pass actually flipped are announced.
    pub async fn sweep(&self, now: DateTime<Utc>, sweep_number: u64) -> SweepMetrics {
        let started = Instant::now();
        let mut metrics = SweepMetrics::new("respawn", sweep_number);

        match self.repo.find_respawnable_npcs(now).await {
            Ok(due) => {
                metrics.candidates = due.len();
                for npc in due {
                    match self.repo.reactivate_npc(npc.id).await {
                        Ok(true) => {
                            metrics.applied += 1;
                            let frame = ServerMessage::NpcRespawned {
                                npc_id: npc.id,
                                map: npc.map.clone(),
                            }
                            .to_json();
                            self.registry.publish(&frame, None);
                            tracing::info!(npc_id = npc.id, map = %npc.map, "NPC respawned");
                        }
                        Ok(false) => {}
                        Err(e) => {
                            metrics.failures += 1;
                            tracing::warn!(npc_id = npc.id, "Failed to reactivate NPC: {}", e);
                        }
                    }
                }
            }
            Err(e) => {
                metrics.failures += 1;
                tracing::warn!("Respawn lookup failed, retrying next tick: {}", e);
            }
        }

        metrics.duration_us = started.elapsed().as_micros();
        metrics.log();
        metrics
    }

    /// Sweep every period until shutdown. The first sweep runs one period
    /// after start.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let start = tokio::time::Instant::now() + self.period;
        let mut ticker = tokio::time::interval_at(start, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(period_secs = self.period.as_secs(), "Respawn scheduler started");
        let mut sweep_number = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep_number += 1;
                    self.sweep(Utc::now(), sweep_number).await;
                }
                _ = wait_for_shutdown(&mut shutdown_rx) => break,
            }
        }
        tracing::info!("Respawn scheduler stopped");
    }
}
