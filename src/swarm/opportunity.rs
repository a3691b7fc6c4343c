//! Opportunity types flowing through the coordination cycle

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::swarm::agent::AgentId;

/// A candidate cross-chain arbitrage opportunity surfaced by a producer
/// agent. Ephemeral: discarded after the consensus decision unless approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub token: String,
    pub source_exchange: String,
    pub target_exchange: String,
    pub source_chain: String,
    pub target_chain: String,
    pub source_price: Decimal,
    pub target_price: Decimal,
    /// Gross spread in percent
    pub profit_percentage: f64,
    pub estimated_profit: Decimal,
    /// Risk score in [0, 100]
    pub risk_score: f64,
    pub timestamp: DateTime<Utc>,
    /// Producer agent, tagged during collection
    #[serde(default)]
    pub source_agent: Option<AgentId>,
}

/// Outcome of a consensus round over one opportunity
#[derive(Debug, Clone, Serialize)]
pub struct ConsensusResult {
    pub approved: bool,
    /// approved_votes / total_votes
    pub score: f64,
    pub total_votes: usize,
    pub approved_votes: usize,
    /// Explanatory only; never feeds back into the decision
    pub reasoning: String,
}

/// An opportunity that passed consensus, annotated with the round's result
#[derive(Debug, Clone, Serialize)]
pub struct ApprovedOpportunity {
    pub opportunity: Opportunity,
    pub consensus_score: f64,
    pub consensus_reasoning: String,
}

/// Recorded outcome of delegating an approved opportunity for execution.
/// Execution failure is a recorded outcome, never a raised error.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub token: String,
    pub agent: AgentId,
    pub success: bool,
    pub profit: Decimal,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}
