use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use player_db::Repository;

#[derive(Debug, Clone, PartialEq)]
struct PendingPosition {
    x: f64,
    y: f64,
    map: String,
}

/// Coalesces position updates into at most one durable write per player
/// per window. The write always carries the latest position seen.
#[derive(Clone)]
pub struct PositionWriter {
    repo: Arc<dyn Repository>,
    window: Duration,
    pending: Arc<Mutex<HashMap<i64, PendingPosition>>>,
    writes: Arc<AtomicU64>,
}

impl PositionWriter {
    pub fn new(repo: Arc<dyn Repository>, window: Duration) -> Self {
        Self {
            repo,
            window,
            pending: Arc::new(Mutex::new(HashMap::new())),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<i64, PendingPosition>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the latest position. The first call in a window arms a
    /// delayed write; later calls only overwrite the pending position.
    pub fn schedule(&self, player_id: i64, x: f64, y: f64, map: &str) {
        let position = PendingPosition {
            x,
            y,
            map: map.to_string(),
        };
        let armed = self.pending().insert(player_id, position).is_some();
        if armed {
            return;
        }

        let writer = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(writer.window).await;
            writer.flush(player_id).await;
        });
    }

    /// Write the pending position for `player_id` now, if any.
    pub async fn flush(&self, player_id: i64) {
        let position = self.pending().remove(&player_id);
        if let Some(position) = position {
            self.write(player_id, position).await;
        }
    }

    /// Write every pending position. Used on shutdown.
    pub async fn flush_all(&self) {
        let drained: Vec<(i64, PendingPosition)> = self.pending().drain().collect();
        let count = drained.len();
        for (player_id, position) in drained {
            self.write(player_id, position).await;
        }
        if count > 0 {
            tracing::info!(count, "Flushed pending positions");
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Durable writes performed so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    async fn write(&self, player_id: i64, position: PendingPosition) {
        match self
            .repo
            .update_player_position(player_id, position.x, position.y, &position.map)
            .await
        {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(player_id, "Failed to persist position: {}", e);
            }
        }
    }
}
