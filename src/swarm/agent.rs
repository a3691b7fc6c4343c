//! Agent records and the collaborator capability contract
//!
//! The engine never implements agent domain logic itself. Collaborators
//! provide `AgentCapability` implementations (market analysis, risk scoring,
//! execution, ...) and the pool tracks a structural `AgentRecord` per handle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::swarm::opportunity::Opportunity;

/// Arena-assigned agent identifier. Monotonic per pool, so ordering by id is
/// ordering by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Agent specialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    MarketAnalysis,
    ArbitrageDetection,
    RiskAssessment,
    Execution,
    PortfolioManagement,
}

impl AgentRole {
    /// Fixed fill order used when distributing pool capacity across roles
    pub const PRIORITY: [AgentRole; 5] = [
        AgentRole::MarketAnalysis,
        AgentRole::ArbitrageDetection,
        AgentRole::RiskAssessment,
        AgentRole::Execution,
        AgentRole::PortfolioManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::MarketAnalysis => "market_analysis",
            AgentRole::ArbitrageDetection => "arbitrage_detection",
            AgentRole::RiskAssessment => "risk_assessment",
            AgentRole::Execution => "execution",
            AgentRole::PortfolioManagement => "portfolio_management",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Agent availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Busy,
}

impl AgentStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, AgentStatus::Active)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Inactive => write!(f, "inactive"),
            AgentStatus::Busy => write!(f, "busy"),
        }
    }
}

/// Structural record the pool keeps per agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub role: AgentRole,
    pub status: AgentStatus,
    /// Current workload in [0, 1]
    pub current_load: f64,
    /// Rolling success rate in [0, 1]
    pub success_rate: f64,
    pub created_at: DateTime<Utc>,
}

/// Per-agent recommendation on an opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Execute,
    /// Default so a vote missing a recommendation counts as skip
    #[default]
    Skip,
}

/// One agent's vote on one opportunity. Never persisted past the round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(default)]
    pub recommendation: Recommendation,
    /// Confidence in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Rolling performance stats reported by a collaborator
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub success_rate: f64,
    pub current_load: f64,
}

/// Result of delegating an opportunity to an execution agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default)]
    pub profit: Decimal,
    #[serde(default)]
    pub error: Option<String>,
}

/// Capability contract implemented by collaborator agents.
///
/// Any method returning `Result` may fail; the engine isolates failures per
/// agent when fault tolerance is enabled.
#[async_trait]
pub trait AgentCapability: Send + Sync {
    fn role(&self) -> AgentRole;

    async fn status(&self) -> AgentStatus;

    /// Candidate opportunities surfaced by this agent (may be empty)
    async fn opportunities(&self) -> Result<Vec<Opportunity>>;

    /// Independent analysis of one opportunity
    async fn analyze(&self, opportunity: &Opportunity) -> Result<Vote>;

    /// Execute an approved opportunity
    async fn execute(&self, opportunity: &Opportunity) -> Result<ExecutionOutcome>;

    async fn performance_metrics(&self) -> Result<PerformanceReport>;

    /// Workload-adjustment directive from the load balancer. Positive delta
    /// means take on more work, negative means shed it.
    async fn adjust_workload(&self, delta: f64) -> Result<()>;
}

/// Creates collaborator agents for a given role at pool init and scale-up
pub trait AgentFactory: Send + Sync {
    fn create(&self, role: AgentRole) -> Arc<dyn AgentCapability>;
}
