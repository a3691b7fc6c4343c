//! Graceful Shutdown Handler
//!
//! Coordinated teardown for the swarm: intake stops first, then in-flight
//! consensus rounds and executions drain to completion before the pool is
//! torn down. No partial votes or partial transfers are abandoned mid-flight.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Normal graceful shutdown: drain everything
    Graceful,
    /// Emergency shutdown: skip drain waits
    Emergency,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
            ShutdownSignal::Emergency => write!(f, "emergency"),
        }
    }
}

/// Configuration for graceful shutdown
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for in-flight consensus rounds (default: 30s)
    pub round_drain_timeout_secs: u64,
    /// Time to wait for in-flight executions (default: 120s)
    pub execution_drain_timeout_secs: u64,
    /// Poll interval while draining (default: 50ms)
    pub poll_interval_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            round_drain_timeout_secs: 30,
            execution_drain_timeout_secs: 120,
            poll_interval_ms: 50,
        }
    }
}

/// Shutdown phase tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Not shutting down
    Running,
    /// Refusing new opportunities and rounds
    StoppingIntake,
    /// Waiting for in-flight consensus rounds
    DrainingRounds,
    /// Waiting for in-flight executions
    DrainingExecutions,
    /// Final metrics recomputation
    FlushingMetrics,
    /// Shutdown complete
    Complete,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Running => write!(f, "running"),
            ShutdownPhase::StoppingIntake => write!(f, "stopping_intake"),
            ShutdownPhase::DrainingRounds => write!(f, "draining_rounds"),
            ShutdownPhase::DrainingExecutions => write!(f, "draining_executions"),
            ShutdownPhase::FlushingMetrics => write!(f, "flushing_metrics"),
            ShutdownPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Count of in-flight operations, incremented through RAII guards so a
/// panicking task still decrements.
#[derive(Clone, Default)]
pub struct InFlightGauge {
    count: Arc<AtomicUsize>,
}

impl InFlightGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

pub struct InFlightGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Graceful shutdown coordinator
pub struct GracefulShutdown {
    config: ShutdownConfig,
    shutdown_requested: AtomicBool,
    phase: watch::Sender<ShutdownPhase>,
    phase_rx: watch::Receiver<ShutdownPhase>,
    signal_tx: broadcast::Sender<ShutdownSignal>,
}

impl GracefulShutdown {
    pub fn new(config: ShutdownConfig) -> Self {
        let (phase_tx, phase_rx) = watch::channel(ShutdownPhase::Running);
        let (signal_tx, _) = broadcast::channel(8);
        Self {
            config,
            shutdown_requested: AtomicBool::new(false),
            phase: phase_tx,
            phase_rx,
            signal_tx,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ShutdownConfig::default())
    }

    /// Subscribe to shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.signal_tx.subscribe()
    }

    /// Receiver for phase changes; background loops exit once the phase
    /// leaves `Running`
    pub fn phase_receiver(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase_rx.clone()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn current_phase(&self) -> ShutdownPhase {
        *self.phase_rx.borrow()
    }

    /// Request shutdown with specified signal type
    pub fn request_shutdown(&self, signal: ShutdownSignal) {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            warn!("Shutdown already requested, ignoring duplicate signal: {}", signal);
            return;
        }
        info!("Shutdown requested: {}", signal);
        let _ = self.signal_tx.send(signal);
    }

    pub fn set_phase(&self, phase: ShutdownPhase) {
        let _ = self.phase.send(phase);
        info!("Shutdown phase: {}", phase);
    }

    /// Drain a gauge to zero within the phase timeout. Returns whether the
    /// gauge actually reached zero.
    async fn drain(&self, gauge: &InFlightGauge, timeout_secs: u64, what: &str) -> bool {
        let timeout = Duration::from_secs(timeout_secs);
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let wait = async {
            while gauge.current() > 0 {
                tokio::time::sleep(poll).await;
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(()) => {
                debug!("all in-flight {} drained", what);
                true
            }
            Err(_) => {
                warn!(
                    remaining = gauge.current(),
                    timeout_secs, "{} drain timed out, proceeding anyway", what
                );
                false
            }
        }
    }

    /// Execute the drain sequence: stop intake, drain rounds, drain
    /// executions, flush metrics. The caller must already have gated its
    /// intake on `is_shutdown_requested`.
    pub async fn execute(
        &self,
        rounds: &InFlightGauge,
        executions: &InFlightGauge,
    ) -> Result<(), ShutdownError> {
        let start = std::time::Instant::now();

        self.set_phase(ShutdownPhase::StoppingIntake);

        self.set_phase(ShutdownPhase::DrainingRounds);
        let rounds_ok = self
            .drain(rounds, self.config.round_drain_timeout_secs, "consensus rounds")
            .await;

        self.set_phase(ShutdownPhase::DrainingExecutions);
        let execs_ok = self
            .drain(
                executions,
                self.config.execution_drain_timeout_secs,
                "executions",
            )
            .await;

        self.set_phase(ShutdownPhase::FlushingMetrics);
        self.set_phase(ShutdownPhase::Complete);

        info!("Graceful shutdown completed in {:?}", start.elapsed());
        if rounds_ok && execs_ok {
            Ok(())
        } else {
            Err(ShutdownError::Timeout)
        }
    }
}

/// Shutdown errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// A drain phase timed out
    Timeout,
}

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownError::Timeout => write!(f, "shutdown drain timed out"),
        }
    }
}

impl std::error::Error for ShutdownError {}
