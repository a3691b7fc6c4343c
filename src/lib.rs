pub mod config;
pub mod coordination;
pub mod error;
pub mod swarm;
pub mod telemetry;

pub use config::{
    BalancerConfig, CoordinationStrategy, HiveConfig, LoggingConfig, ScalingConfig, SwarmConfig,
    SynthesisConfig,
};
pub use coordination::{
    GracefulShutdown, InFlightGauge, ShutdownConfig, ShutdownPhase, ShutdownSignal,
};
pub use error::{HiveError, Result};
pub use swarm::{
    AgentCapability, AgentFactory, AgentId, AgentPool, AgentRecord, AgentRole, AgentStatus,
    ApprovedOpportunity, ConsensusEngine, ConsensusResult, ExecutionOutcome, ExecutionRecord,
    MetricsSnapshot, MetricsTracker, NoSynthesizer, Opportunity, PerformanceReport,
    ReasoningSynthesizer, Recommendation, RemoveOutcome, ScaleAction, Swarm, Vote,
};
