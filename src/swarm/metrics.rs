//! Metrics Tracker — swarm throughput and efficiency statistics

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Read-only view of current counters and derived values
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_opportunities: u64,
    pub successful_trades: u64,
    pub total_profit: Decimal,
    /// successful / total, 0.0 when nothing was attempted
    pub swarm_efficiency: f64,
    pub opportunities_per_hour: f64,
    pub uptime_secs: u64,
}

/// Monotonically accumulating counters with derived fields recomputed on
/// each update
pub struct MetricsTracker {
    started_at: DateTime<Utc>,
    total_opportunities: u64,
    successful_trades: u64,
    total_profit: Decimal,
    swarm_efficiency: f64,
    opportunities_per_hour: f64,
    uptime_secs: u64,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            total_opportunities: 0,
            successful_trades: 0,
            total_profit: Decimal::ZERO,
            swarm_efficiency: 0.0,
            opportunities_per_hour: 0.0,
            uptime_secs: 0,
        }
    }

    /// Record one execution outcome. Success increments both counters and
    /// accumulates profit; failure increments the total only.
    pub fn record_execution(&mut self, success: bool, profit: Decimal) {
        self.total_opportunities += 1;
        if success {
            self.successful_trades += 1;
            self.total_profit += profit;
        }
    }

    /// Recompute derived fields from the counters and the wall clock
    pub fn update(&mut self) {
        self.update_at(Utc::now());
    }

    fn update_at(&mut self, now: DateTime<Utc>) {
        self.swarm_efficiency = if self.total_opportunities == 0 {
            0.0
        } else {
            self.successful_trades as f64 / self.total_opportunities as f64
        };

        let elapsed_secs = (now - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        self.uptime_secs = elapsed_secs as u64;

        let elapsed_hours = elapsed_secs / 3600.0;
        self.opportunities_per_hour = if elapsed_hours > 0.0 {
            self.total_opportunities as f64 / elapsed_hours
        } else {
            0.0
        };
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_opportunities: self.total_opportunities,
            successful_trades: self.successful_trades,
            total_profit: self.total_profit,
            swarm_efficiency: self.swarm_efficiency,
            opportunities_per_hour: self.opportunities_per_hour,
            uptime_secs: self.uptime_secs,
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}
