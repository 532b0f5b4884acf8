use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Outcome of one background sweep (respawn pass, flush pass).
#[derive(Debug, Clone, Default)]
pub struct SweepMetrics {
    pub sweep: &'static str,
    pub sweep_number: u64,
    pub duration_us: u128,
    /// Records examined by the sweep.
    pub candidates: usize,
    /// Records the sweep actually changed.
    pub applied: usize,
    pub failures: usize,
}

impl SweepMetrics {
    /// Sweeps slower than this are reported at warn level.
    pub const BUDGET: Duration = Duration::from_millis(250);

    pub fn new(sweep: &'static str, sweep_number: u64) -> Self {
        Self {
            sweep,
            sweep_number,
            ..Self::default()
        }
    }

    pub fn over_budget(&self) -> bool {
        self.duration_us > Self::BUDGET.as_micros()
    }

    pub fn log(&self) {
        if self.over_budget() {
            tracing::warn!(
                sweep = self.sweep,
                number = self.sweep_number,
                duration_us = self.duration_us,
                candidates = self.candidates,
                applied = self.applied,
                failures = self.failures,
                "sweep exceeded budget ({}us > {}us)",
                self.duration_us,
                Self::BUDGET.as_micros()
            );
        } else if self.applied > 0 || self.failures > 0 {
            tracing::info!(
                sweep = self.sweep,
                number = self.sweep_number,
                duration_us = self.duration_us,
                candidates = self.candidates,
                applied = self.applied,
                failures = self.failures,
                "sweep completed"
            );
        } else {
            tracing::debug!(
                sweep = self.sweep,
                number = self.sweep_number,
                duration_us = self.duration_us,
                "sweep idle"
            );
        }
    }
}
