//! Load Monitor, Auto-Scaler and Load Balancer
//!
//! Both control loops run on their own cadence, decoupled from opportunity
//! processing; a tick never blocks the consensus or execution path. The
//! watermarks and step sizes come from configuration, never from constants
//! baked into the loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{BalancerConfig, ScalingConfig};
use crate::coordination::ShutdownPhase;
use crate::swarm::agent::{AgentId, AgentRecord};
use crate::swarm::pool::AgentPool;

/// Fraction of agents currently active. Pure function of a pool snapshot;
/// an empty pool reads as 0.0.
pub fn swarm_load(snapshot: &[AgentRecord]) -> f64 {
    if snapshot.is_empty() {
        return 0.0;
    }
    let active = snapshot.iter().filter(|r| r.status.is_active()).count();
    active as f64 / snapshot.len() as f64
}

/// Outcome of one scaling check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    ScaledUp(usize),
    ScaledDown(usize),
    Held,
}

/// Periodic control loop growing and shrinking the pool from load watermarks
pub struct AutoScaler {
    pool: Arc<AgentPool>,
    config: ScalingConfig,
}

impl AutoScaler {
    pub fn new(pool: Arc<AgentPool>, config: ScalingConfig) -> Self {
        Self { pool, config }
    }

    /// One scaling check against the current pool snapshot
    pub async fn scale_once(&self) -> ScaleAction {
        self.pool.sync_performance().await;
        let load = swarm_load(&self.pool.snapshot().await);

        if load > self.config.high_watermark {
            let added = self.pool.add(self.config.scale_up_count).await;
            info!(load, added, "swarm overloaded, scaled up");
            ScaleAction::ScaledUp(added)
        } else if load < self.config.low_watermark {
            let outcome = self.pool.remove(self.config.scale_down_count).await;
            info!(load, removed = outcome.removed.len(), "swarm underutilized, scaled down");
            ScaleAction::ScaledDown(outcome.removed.len())
        } else {
            debug!(load, "swarm load within watermarks");
            ScaleAction::Held
        }
    }

    /// Run until the shutdown phase leaves `Running`
    pub async fn run(&self, mut phase: watch::Receiver<ShutdownPhase>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.scale_once().await;
                }
                changed = phase.changed() => {
                    if changed.is_err() || *phase.borrow() != ShutdownPhase::Running {
                        debug!("auto-scaler loop stopping");
                        return;
                    }
                }
            }
        }
    }
}

/// Redistributes work from over- to under-loaded agents without changing
/// pool size
pub struct LoadBalancer {
    pool: Arc<AgentPool>,
    config: BalancerConfig,
}

impl LoadBalancer {
    pub fn new(pool: Arc<AgentPool>, config: BalancerConfig) -> Self {
        Self { pool, config }
    }

    /// One balancing pass. Ranks agents by load, pairs extremes inward and
    /// sheds half the gap from the loaded agent to the idle one. Returns
    /// the number of directives issued.
    pub async fn balance_once(&self) -> usize {
        self.pool.sync_performance().await;
        let mut ranked: Vec<(AgentId, f64)> = self
            .pool
            .snapshot()
            .await
            .iter()
            .filter(|r| r.status.is_active())
            .map(|r| (r.id, r.current_load))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut directives = 0usize;
        if ranked.len() < 2 {
            return directives;
        }

        let (mut hi, mut lo) = (0usize, ranked.len() - 1);
        while hi < lo {
            let gap = ranked[hi].1 - ranked[lo].1;
            if gap <= self.config.imbalance_threshold {
                break;
            }
            let delta = gap / 2.0;

            for (idx, adjustment) in [(hi, -delta), (lo, delta)] {
                let (id, _) = ranked[idx];
                match self.pool.handle_of(id).await {
                    Some(handle) => match handle.adjust_workload(adjustment).await {
                        Ok(()) => {
                            directives += 1;
                            ranked[idx].1 += adjustment;
                        }
                        Err(e) => warn!(agent = %id, error = %e, "workload directive failed"),
                    },
                    None => warn!(agent = %id, "agent evicted mid-balance"),
                }
            }
            debug!(
                from = %ranked[hi].0,
                to = %ranked[lo].0,
                delta,
                "workload shed between pair"
            );
            hi += 1;
            lo -= 1;
        }
        directives
    }

    /// Run until the shutdown phase leaves `Running`
    pub async fn run(&self, mut phase: watch::Receiver<ShutdownPhase>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.balance_once().await;
                }
                changed = phase.changed() => {
                    if changed.is_err() || *phase.borrow() != ShutdownPhase::Running {
                        debug!("load-balancer loop stopping");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::agent::AgentStatus;
    use crate::swarm::testutil::StubFactory;

    fn scaling() -> ScalingConfig {
        ScalingConfig {
            high_watermark: 0.9,
            low_watermark: 0.3,
            scale_up_count: 2,
            scale_down_count: 1,
            interval_secs: 30,
        }
    }

    async fn pool_of(max: usize) -> (Arc<StubFactory>, Arc<AgentPool>) {
        let factory = Arc::new(StubFactory::default());
        let pool = Arc::new(AgentPool::new(max, factory.clone()));
        pool.initialize().await;
        (factory, pool)
    }

    #[tokio::test]
    async fn test_swarm_load_half_active() {
        let (factory, pool) = pool_of(4).await;
        factory.agent(3).set_status(AgentStatus::Inactive);
        factory.agent(4).set_status(AgentStatus::Inactive);
        pool.sync_performance().await;

        assert_eq!(swarm_load(&pool.snapshot().await), 0.5);
    }

    #[test]
    fn test_swarm_load_empty_pool_is_zero() {
        assert_eq!(swarm_load(&[]), 0.0);
    }

    #[tokio::test]
    async fn test_scale_up_when_overloaded() {
        let (_factory, pool) = pool_of(10).await;
        // Free headroom first; all remaining agents are active => load 1.0
        pool.remove(4).await;
        assert_eq!(pool.len().await, 6);

        let scaler = AutoScaler::new(pool.clone(), scaling());
        assert_eq!(scaler.scale_once().await, ScaleAction::ScaledUp(2));
        assert_eq!(pool.len().await, 8);
    }

    #[tokio::test]
    async fn test_scale_down_when_underutilized() {
        let (factory, pool) = pool_of(10).await;
        // 2 of 10 active => load 0.2
        for id in 1..=8 {
            factory.agent(id).set_status(AgentStatus::Inactive);
        }
        pool.sync_performance().await;

        let scaler = AutoScaler::new(pool.clone(), scaling());
        assert_eq!(scaler.scale_once().await, ScaleAction::ScaledDown(1));
        assert_eq!(pool.len().await, 9);
    }

    #[tokio::test]
    async fn test_scale_holds_between_watermarks() {
        let (factory, pool) = pool_of(10).await;
        // 5 of 10 active => load 0.5
        for id in 1..=5 {
            factory.agent(id).set_status(AgentStatus::Inactive);
        }
        pool.sync_performance().await;

        let scaler = AutoScaler::new(pool.clone(), scaling());
        assert_eq!(scaler.scale_once().await, ScaleAction::Held);
        assert_eq!(pool.len().await, 10);
    }

    #[tokio::test]
    async fn test_balance_sheds_from_high_to_low() {
        let (factory, pool) = pool_of(5).await;
        factory.agent(1).set_load(0.9);
        factory.agent(2).set_load(0.5);
        factory.agent(3).set_load(0.5);
        factory.agent(4).set_load(0.5);
        factory.agent(5).set_load(0.1);

        let balancer = LoadBalancer::new(
            pool.clone(),
            BalancerConfig {
                imbalance_threshold: 0.5,
                interval_secs: 60,
            },
        );
        // One imbalanced pair (0.9 vs 0.1) => two directives
        assert_eq!(balancer.balance_once().await, 2);

        assert_eq!(factory.agent(1).adjust_calls.lock().unwrap().as_slice(), &[-0.4]);
        assert_eq!(factory.agent(5).adjust_calls.lock().unwrap().as_slice(), &[0.4]);
    }

    #[tokio::test]
    async fn test_balance_stops_below_threshold() {
        let (factory, pool) = pool_of(5).await;
        for id in 1..=5 {
            factory.agent(id).set_load(0.5);
        }

        let balancer = LoadBalancer::new(pool.clone(), BalancerConfig::default());
        assert_eq!(balancer.balance_once().await, 0);
        assert!(factory.agent(1).adjust_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_balance_handles_multiple_pairs() {
        let (factory, pool) = pool_of(6).await;
        factory.agent(1).set_load(1.0);
        factory.agent(2).set_load(0.9);
        factory.agent(3).set_load(0.5);
        factory.agent(4).set_load(0.5);
        factory.agent(5).set_load(0.1);
        factory.agent(6).set_load(0.0);

        let balancer = LoadBalancer::new(
            pool.clone(),
            BalancerConfig {
                imbalance_threshold: 0.5,
                interval_secs: 60,
            },
        );
        // Pairs (1.0, 0.0) and (0.9, 0.1) both exceed the threshold
        assert_eq!(balancer.balance_once().await, 4);
    }

    #[tokio::test]
    async fn test_balance_skips_inactive_agents() {
        let (factory, pool) = pool_of(4).await;
        factory.agent(1).set_load(0.9);
        factory.agent(2).set_status(AgentStatus::Busy);
        factory.agent(2).set_load(0.0);
        factory.agent(3).set_load(0.8);
        factory.agent(4).set_load(0.7);

        let balancer = LoadBalancer::new(
            pool.clone(),
            BalancerConfig {
                imbalance_threshold: 0.5,
                interval_secs: 60,
            },
        );
        // The idle agent is busy-flagged, active spread is only 0.2
        assert_eq!(balancer.balance_once().await, 0);
    }

    #[tokio::test]
    async fn test_scaler_respects_role_coverage_on_shrink() {
        let (factory, pool) = pool_of(5).await;
        for id in 1..=5 {
            factory.agent(id).set_status(AgentStatus::Inactive);
        }
        pool.sync_performance().await;

        let scaler = AutoScaler::new(pool.clone(), scaling());
        // Every agent is the last of its role: shrink removes nothing
        assert_eq!(scaler.scale_once().await, ScaleAction::ScaledDown(0));
        assert_eq!(pool.len().await, 5);
    }
}
