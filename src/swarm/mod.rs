//! Swarm Coordination Engine
//!
//! A pool of specialized worker agents jointly evaluates candidate
//! arbitrage opportunities, reaches a threshold-based consensus decision,
//! and keeps itself sized and balanced under varying load.

pub mod agent;
pub mod consensus;
pub mod coordinator;
pub mod metrics;
pub mod monitor;
pub mod opportunity;
pub mod pool;

#[cfg(test)]
pub(crate) mod testutil;

pub use agent::{
    AgentCapability, AgentFactory, AgentId, AgentRecord, AgentRole, AgentStatus, ExecutionOutcome,
    PerformanceReport, Recommendation, Vote,
};
pub use consensus::{
    compute_consensus, ConsensusEngine, ConsensusTally, NoSynthesizer, ReasoningSynthesizer,
};
pub use coordinator::Swarm;
pub use metrics::{MetricsSnapshot, MetricsTracker};
pub use monitor::{swarm_load, AutoScaler, LoadBalancer, ScaleAction};
pub use opportunity::{ApprovedOpportunity, ConsensusResult, ExecutionRecord, Opportunity};
pub use pool::{AgentPool, RemoveOutcome};
