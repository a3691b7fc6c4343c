//! Opportunity Coordinator — the swarm facade
//!
//! Owns the end-to-end cycle: gather candidates from producer agents, run
//! consensus per opportunity, delegate approved ones to the least-loaded
//! execution agent and record the outcome. Also owns the auto-scaling and
//! load-balancing background loops and the graceful drain on shutdown.

use dashmap::DashMap;
use futures::future::join_all;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::HiveConfig;
use crate::coordination::{GracefulShutdown, InFlightGauge, ShutdownSignal};
use crate::error::{HiveError, Result};
use crate::swarm::agent::AgentFactory;
use crate::swarm::consensus::{ConsensusEngine, ReasoningSynthesizer};
use crate::swarm::metrics::{MetricsSnapshot, MetricsTracker};
use crate::swarm::monitor::{swarm_load, AutoScaler, LoadBalancer, ScaleAction};
use crate::swarm::opportunity::{ApprovedOpportunity, ExecutionRecord, Opportunity};
use crate::swarm::pool::AgentPool;

/// Coordinated pool of specialized worker agents
pub struct Swarm {
    id: String,
    config: HiveConfig,
    pool: Arc<AgentPool>,
    consensus: ConsensusEngine,
    scaler: Arc<AutoScaler>,
    balancer: Arc<LoadBalancer>,
    metrics: Arc<RwLock<MetricsTracker>>,
    // One lock per token: at most one in-flight execution per token,
    // preventing duplicate fund movement
    execution_locks: DashMap<String, Arc<Mutex<()>>>,
    shutdown: Arc<GracefulShutdown>,
    rounds_in_flight: InFlightGauge,
    executions_in_flight: InFlightGauge,
    loops: StdMutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Swarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swarm").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Swarm {
    /// Build and populate a swarm. Fails on invalid configuration before
    /// any agent is created; no partially-built swarm is observable.
    pub async fn initialize(
        config: HiveConfig,
        factory: Arc<dyn AgentFactory>,
        synthesizer: Arc<dyn ReasoningSynthesizer>,
    ) -> Result<Arc<Self>> {
        config.swarm.check()?;
        if let Err(errors) = config.validate() {
            return Err(HiveError::Config(errors.join("; ")));
        }

        let pool = Arc::new(AgentPool::new(config.swarm.max_agents, factory));
        pool.initialize().await;

        let consensus = ConsensusEngine::new(
            Arc::clone(&pool),
            synthesizer,
            &config.swarm,
            &config.synthesis,
        );
        let scaler = Arc::new(AutoScaler::new(Arc::clone(&pool), config.scaling.clone()));
        let balancer = Arc::new(LoadBalancer::new(Arc::clone(&pool), config.balancer.clone()));

        let swarm = Arc::new(Self {
            id: format!("arbitrage-swarm-{}", Uuid::new_v4()),
            config,
            pool,
            consensus,
            scaler,
            balancer,
            metrics: Arc::new(RwLock::new(MetricsTracker::new())),
            execution_locks: DashMap::new(),
            shutdown: Arc::new(GracefulShutdown::with_defaults()),
            rounds_in_flight: InFlightGauge::new(),
            executions_in_flight: InFlightGauge::new(),
            loops: StdMutex::new(Vec::new()),
        });
        info!(swarm = %swarm.id, agents = swarm.pool.len().await, "swarm initialized");
        Ok(swarm)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pool(&self) -> &Arc<AgentPool> {
        &self.pool
    }

    /// Spawn the auto-scaling and load-balancing loops on their own
    /// cadences. Either loop is skipped when disabled in the config.
    pub fn start_background_loops(&self) {
        let mut loops = self.loops.lock().expect("loop registry poisoned");

        if self.config.swarm.auto_scaling {
            let scaler = Arc::clone(&self.scaler);
            let phase = self.shutdown.phase_receiver();
            loops.push(tokio::spawn(async move { scaler.run(phase).await }));
        }
        if self.config.swarm.load_balancing {
            let balancer = Arc::clone(&self.balancer);
            let phase = self.shutdown.phase_receiver();
            loops.push(tokio::spawn(async move { balancer.run(phase).await }));
        }
    }

    fn check_intake(&self) -> Result<()> {
        if self.shutdown.is_shutdown_requested() {
            return Err(HiveError::ShuttingDown);
        }
        Ok(())
    }

    /// Poll every active agent for candidate opportunities and tag each with
    /// its producer's id. Failing or empty producers contribute nothing;
    /// partial failure never raises.
    pub async fn collect_opportunities(&self) -> Result<Vec<Opportunity>> {
        self.check_intake()?;
        let producers = self.pool.active_agents().await;

        let batches = join_all(producers.iter().map(|(id, handle)| async move {
            (*id, handle.opportunities().await)
        }))
        .await;

        let mut collected = Vec::new();
        for (id, batch) in batches {
            match batch {
                Ok(opportunities) => {
                    for mut opportunity in opportunities {
                        opportunity.source_agent = Some(id);
                        collected.push(opportunity);
                    }
                }
                Err(e) => {
                    warn!(agent = %id, error = %e, "opportunity poll failed");
                }
            }
        }
        debug!(count = collected.len(), "opportunities collected from pool");
        Ok(collected)
    }

    /// Run consensus over a batch, keeping only approved opportunities,
    /// each annotated with its round's score and reasoning.
    pub async fn coordinate(
        &self,
        opportunities: Vec<Opportunity>,
    ) -> Result<Vec<ApprovedOpportunity>> {
        self.check_intake()?;
        let _round = self.rounds_in_flight.enter();

        let mut approved = Vec::new();
        for opportunity in opportunities {
            let result = self.consensus.decide(&opportunity).await?;
            if result.approved {
                approved.push(ApprovedOpportunity {
                    opportunity,
                    consensus_score: result.score,
                    consensus_reasoning: result.reasoning,
                });
            } else {
                debug!(
                    token = %opportunity.token,
                    score = result.score,
                    "opportunity rejected by consensus"
                );
            }
        }
        Ok(approved)
    }

    /// Delegate an approved opportunity to the least-loaded execution agent
    /// and record the outcome. Execution failure is a recorded outcome,
    /// never an error; executions on the same token are serialized.
    pub async fn execute(&self, opportunity: &Opportunity) -> Result<ExecutionRecord> {
        self.check_intake()?;
        let _in_flight = self.executions_in_flight.enter();

        let token_lock = Arc::clone(
            self.execution_locks
                .entry(opportunity.token.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let _token_guard = token_lock.lock().await;

        let (agent_id, handle) = self
            .pool
            .select_execution_agent()
            .await
            .ok_or(HiveError::NoExecutionAgent)?;

        let record = match handle.execute(opportunity).await {
            Ok(outcome) => ExecutionRecord {
                token: opportunity.token.clone(),
                agent: agent_id,
                success: outcome.success,
                profit: outcome.profit,
                error: outcome.error,
                executed_at: chrono::Utc::now(),
            },
            // A collaborator throwing is still a recorded failure
            Err(e) => ExecutionRecord {
                token: opportunity.token.clone(),
                agent: agent_id,
                success: false,
                profit: rust_decimal::Decimal::ZERO,
                error: Some(e.to_string()),
                executed_at: chrono::Utc::now(),
            },
        };

        {
            let mut metrics = self.metrics.write().await;
            metrics.record_execution(record.success, record.profit);
        }
        if record.success {
            info!(token = %record.token, agent = %agent_id, profit = %record.profit, "trade executed");
        } else {
            warn!(token = %record.token, agent = %agent_id, error = ?record.error, "trade failed");
        }
        Ok(record)
    }

    /// One full coordination cycle: collect, decide, execute approved.
    pub async fn run_cycle(&self) -> Result<Vec<ExecutionRecord>> {
        let opportunities = self.collect_opportunities().await?;
        let approved = self.coordinate(opportunities).await?;
        let mut records = Vec::with_capacity(approved.len());
        for item in &approved {
            records.push(self.execute(&item.opportunity).await?);
        }
        Ok(records)
    }

    /// Recompute and return the performance statistics
    pub async fn performance_snapshot(&self) -> MetricsSnapshot {
        let mut metrics = self.metrics.write().await;
        metrics.update();
        metrics.snapshot()
    }

    /// Current pool utilization
    pub async fn current_load(&self) -> f64 {
        swarm_load(&self.pool.snapshot().await)
    }

    /// Manual scaling trigger (also exercised by the timer loop)
    pub async fn scale_once(&self) -> ScaleAction {
        self.scaler.scale_once().await
    }

    /// Manual balancing trigger (also exercised by the timer loop)
    pub async fn balance_once(&self) -> usize {
        self.balancer.balance_once().await
    }

    /// Stop intake, drain in-flight consensus rounds and executions, stop
    /// the background loops and flush metrics.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.request_shutdown(ShutdownSignal::Graceful);
        let drain = self
            .shutdown
            .execute(&self.rounds_in_flight, &self.executions_in_flight)
            .await;

        let handles: Vec<JoinHandle<()>> = {
            let mut loops = self.loops.lock().expect("loop registry poisoned");
            loops.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }

        {
            let mut metrics = self.metrics.write().await;
            metrics.update();
        }

        drain.map_err(|e| HiveError::Internal(e.to_string()))
    }
}
