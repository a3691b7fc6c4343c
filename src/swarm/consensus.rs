//! Consensus Engine — parallel vote collection and threshold reduction
//!
//! Votes are gathered concurrently from every active agent, reduced by a
//! pure threshold function, and only then annotated with synthesized
//! reasoning. The reasoning text is explanatory and never influences the
//! approve/reject score.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{SwarmConfig, SynthesisConfig};
use crate::error::{HiveError, Result};
use crate::swarm::agent::{AgentId, Recommendation, Vote};
use crate::swarm::opportunity::{ConsensusResult, Opportunity};
use crate::swarm::pool::AgentPool;

/// External LLM collaborator. No availability guarantee; callers bound the
/// wait and fall back to a templated summary.
#[async_trait]
pub trait ReasoningSynthesizer: Send + Sync {
    async fn synthesize(&self, prompt: &str) -> Result<String>;
}

/// Stand-in for swarms wired without an LLM collaborator: always defers to
/// the deterministic templated summary.
pub struct NoSynthesizer;

#[async_trait]
impl ReasoningSynthesizer for NoSynthesizer {
    async fn synthesize(&self, _prompt: &str) -> Result<String> {
        Err(HiveError::Synthesis("no LLM collaborator configured".into()))
    }
}

/// Pure reduction of one round's votes
#[derive(Debug, Clone, Copy)]
pub struct ConsensusTally {
    pub approved: bool,
    pub score: f64,
    pub total_votes: usize,
    pub approved_votes: usize,
}

/// Reduce a vote mapping to an approve/reject tally. Signals `NoQuorum`
/// when the mapping is empty instead of treating it as either outcome.
pub fn compute_consensus(votes: &BTreeMap<AgentId, Vote>, threshold: f64) -> Result<ConsensusTally> {
    let total_votes = votes.len();
    if total_votes == 0 {
        return Err(HiveError::NoQuorum);
    }
    let approved_votes = votes
        .values()
        .filter(|v| v.recommendation == Recommendation::Execute)
        .count();
    let score = approved_votes as f64 / total_votes as f64;
    Ok(ConsensusTally {
        approved: score >= threshold,
        score,
        total_votes,
        approved_votes,
    })
}

/// Deterministic reasoning used whenever the LLM collaborator is
/// unavailable, so a round always completes.
fn templated_summary(tally: &ConsensusTally) -> String {
    format!(
        "{} of {} agents recommended execution",
        tally.approved_votes, tally.total_votes
    )
}

/// Threshold-based consensus over independent agent votes
pub struct ConsensusEngine {
    pool: Arc<AgentPool>,
    synthesizer: Arc<dyn ReasoningSynthesizer>,
    threshold: f64,
    fault_tolerance: bool,
    synthesis_timeout: Duration,
}

impl ConsensusEngine {
    pub fn new(
        pool: Arc<AgentPool>,
        synthesizer: Arc<dyn ReasoningSynthesizer>,
        config: &SwarmConfig,
        synthesis: &SynthesisConfig,
    ) -> Self {
        Self {
            pool,
            synthesizer,
            threshold: config.consensus_threshold,
            fault_tolerance: config.fault_tolerance,
            synthesis_timeout: Duration::from_millis(synthesis.timeout_ms),
        }
    }

    /// Collect one independent vote per active agent, concurrently.
    ///
    /// With fault tolerance on, a failing agent is excluded from the round;
    /// with it off, the first failure aborts the round.
    pub async fn collect_votes(&self, opportunity: &Opportunity) -> Result<BTreeMap<AgentId, Vote>> {
        let voters = self.pool.active_agents().await;

        let results = join_all(voters.iter().map(|(id, handle)| async move {
            (*id, handle.analyze(opportunity).await)
        }))
        .await;

        let mut votes = BTreeMap::new();
        for (id, result) in results {
            match result {
                Ok(vote) => {
                    votes.insert(id, vote);
                }
                Err(e) if self.fault_tolerance => {
                    warn!(agent = %id, error = %e, "vote excluded from round");
                }
                Err(e) => {
                    return Err(HiveError::AgentFailure {
                        agent: id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(votes)
    }

    /// Ask the LLM collaborator for an explanation of the round, bounded by
    /// the configured timeout. Never fails: collaborator errors and
    /// timeouts fall back to the templated summary.
    pub async fn synthesize_reasoning(
        &self,
        opportunity: &Opportunity,
        votes: &BTreeMap<AgentId, Vote>,
        tally: &ConsensusTally,
    ) -> String {
        let prompt = build_prompt(opportunity, votes);
        match tokio::time::timeout(self.synthesis_timeout, self.synthesizer.synthesize(&prompt))
            .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = %e, "reasoning synthesis failed; using templated summary");
                templated_summary(tally)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.synthesis_timeout.as_millis() as u64,
                    "reasoning synthesis timed out; using templated summary"
                );
                templated_summary(tally)
            }
        }
    }

    /// Run a full consensus round: collect, reduce, then explain.
    pub async fn decide(&self, opportunity: &Opportunity) -> Result<ConsensusResult> {
        let votes = self.collect_votes(opportunity).await?;
        let tally = compute_consensus(&votes, self.threshold)?;
        debug!(
            token = %opportunity.token,
            approved = tally.approved,
            score = tally.score,
            votes = tally.total_votes,
            "consensus reached"
        );

        // Decision is final before any free text is produced
        let reasoning = self.synthesize_reasoning(opportunity, &votes, &tally).await;

        Ok(ConsensusResult {
            approved: tally.approved,
            score: tally.score,
            total_votes: tally.total_votes,
            approved_votes: tally.approved_votes,
            reasoning,
        })
    }
}

fn build_prompt(opportunity: &Opportunity, votes: &BTreeMap<AgentId, Vote>) -> String {
    let digest: Vec<serde_json::Value> = votes
        .iter()
        .map(|(id, vote)| {
            json!({
                "agent": id.to_string(),
                "recommendation": vote.recommendation,
                "confidence": vote.confidence,
                "reasoning": vote.reasoning,
            })
        })
        .collect();

    format!(
        "The agent swarm voted on an arbitrage opportunity for {} \
         ({} on {} -> {} on {}). Summarize the swarm's reasoning in two \
         sentences.\nVotes: {}",
        opportunity.token,
        opportunity.source_exchange,
        opportunity.source_chain,
        opportunity.target_exchange,
        opportunity.target_chain,
        serde_json::Value::Array(digest)
    )
}
