use thiserror::Error;

use crate::swarm::agent::AgentId;

/// Main error type for the swarm coordination engine
#[derive(Error, Debug)]
pub enum HiveError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    // Consensus errors
    #[error("No quorum: zero active voting agents in this round")]
    NoQuorum,

    // Collaborator errors
    #[error("Agent {agent} failed: {reason}")]
    AgentFailure { agent: AgentId, reason: String },

    #[error("Reasoning synthesis failed: {0}")]
    Synthesis(String),

    // Pool errors
    #[error("No active execution agent available")]
    NoExecutionAgent,

    // Lifecycle errors
    #[error("Swarm is shutting down; new work is refused")]
    ShuttingDown,

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for HiveError
pub type Result<T> = std::result::Result<T, HiveError>;
