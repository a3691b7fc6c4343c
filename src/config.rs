use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::error::{HiveError, Result};

/// Coordination strategy for the swarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStrategy {
    /// Threshold-based voting across all active agents
    Consensus,
    /// Single designated agent decides
    Leader,
}

impl Default for CoordinationStrategy {
    fn default() -> Self {
        CoordinationStrategy::Consensus
    }
}

/// Core swarm configuration. Immutable once constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct SwarmConfig {
    /// Maximum number of agents in the pool
    pub max_agents: usize,
    /// How decisions are reached
    #[serde(default)]
    pub coordination_strategy: CoordinationStrategy,
    /// Fraction of execute votes required for approval
    pub consensus_threshold: f64,
    /// Enable the periodic load-balancing pass
    #[serde(default = "default_true")]
    pub load_balancing: bool,
    /// Isolate per-agent failures instead of aborting the round
    #[serde(default = "default_true")]
    pub fault_tolerance: bool,
    /// Enable the periodic auto-scaling loop
    #[serde(default = "default_true")]
    pub auto_scaling: bool,
}

fn default_true() -> bool {
    true
}

impl SwarmConfig {
    /// Construct a validated config. Fails if `max_agents` is zero or the
    /// threshold falls outside [0, 1]; no partially-built swarm is ever
    /// observable past this point.
    pub fn new(
        max_agents: usize,
        coordination_strategy: CoordinationStrategy,
        consensus_threshold: f64,
        load_balancing: bool,
        fault_tolerance: bool,
        auto_scaling: bool,
    ) -> Result<Self> {
        let cfg = Self {
            max_agents,
            coordination_strategy,
            consensus_threshold,
            load_balancing,
            fault_tolerance,
            auto_scaling,
        };
        cfg.check()?;
        Ok(cfg)
    }

    /// Validate field ranges
    pub fn check(&self) -> Result<()> {
        if self.max_agents == 0 {
            return Err(HiveError::Config("max_agents must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.consensus_threshold) {
            return Err(HiveError::Config(format!(
                "consensus_threshold must be within [0, 1], got {}",
                self.consensus_threshold
            )));
        }
        Ok(())
    }
}

/// Auto-scaler watermarks and step sizes
#[derive(Debug, Clone, Deserialize)]
pub struct ScalingConfig {
    /// Load above which the pool grows
    #[serde(default = "default_high_watermark")]
    pub high_watermark: f64,
    /// Load below which the pool shrinks
    #[serde(default = "default_low_watermark")]
    pub low_watermark: f64,
    /// Agents added on scale-up
    #[serde(default = "default_scale_up_count")]
    pub scale_up_count: usize,
    /// Agents removed on scale-down
    #[serde(default = "default_scale_down_count")]
    pub scale_down_count: usize,
    /// Seconds between scaling checks
    #[serde(default = "default_scale_interval")]
    pub interval_secs: u64,
}

fn default_high_watermark() -> f64 {
    0.9
}

fn default_low_watermark() -> f64 {
    0.3
}

fn default_scale_up_count() -> usize {
    2
}

fn default_scale_down_count() -> usize {
    1
}

fn default_scale_interval() -> u64 {
    30
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            high_watermark: default_high_watermark(),
            low_watermark: default_low_watermark(),
            scale_up_count: default_scale_up_count(),
            scale_down_count: default_scale_down_count(),
            interval_secs: default_scale_interval(),
        }
    }
}

/// Load-balancer pairing threshold and cadence
#[derive(Debug, Clone, Deserialize)]
pub struct BalancerConfig {
    /// Minimum load gap between a pair before work is shed
    #[serde(default = "default_imbalance_threshold")]
    pub imbalance_threshold: f64,
    /// Seconds between balancing passes
    #[serde(default = "default_balance_interval")]
    pub interval_secs: u64,
}

fn default_imbalance_threshold() -> f64 {
    0.5
}

fn default_balance_interval() -> u64 {
    60
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            imbalance_threshold: default_imbalance_threshold(),
            interval_secs: default_balance_interval(),
        }
    }
}

/// Bounded wait for the LLM reasoning collaborator
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// Milliseconds to wait for the synthesis call before falling back to
    /// the templated summary
    #[serde(default = "default_synthesis_timeout")]
    pub timeout_ms: u64,
}

fn default_synthesis_timeout() -> u64 {
    10_000
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_synthesis_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct HiveConfig {
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub scaling: ScalingConfig,
    #[serde(default)]
    pub balancer: BalancerConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HiveConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("HIVE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (HIVE_SWARM__MAX_AGENTS, etc.)
            .add_source(
                Environment::with_prefix("HIVE")
                    .separator("__")
                    .try_parsing(true),
            );

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.swarm.check()?;
        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.swarm.max_agents == 0 {
            errors.push("swarm.max_agents must be positive".to_string());
        }

        if !(0.0..=1.0).contains(&self.swarm.consensus_threshold) {
            errors.push("swarm.consensus_threshold must be between 0 and 1".to_string());
        }

        if self.scaling.low_watermark >= self.scaling.high_watermark {
            errors.push(format!(
                "scaling.low_watermark ({}) must be below scaling.high_watermark ({})",
                self.scaling.low_watermark, self.scaling.high_watermark
            ));
        }

        if self.scaling.scale_up_count == 0 {
            errors.push("scaling.scale_up_count must be positive".to_string());
        }

        if !(0.0..=1.0).contains(&self.balancer.imbalance_threshold) {
            errors.push("balancer.imbalance_threshold must be between 0 and 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
