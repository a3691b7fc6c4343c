//! Deterministic stub collaborators for unit tests

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{HiveError, Result};
use crate::swarm::agent::{
    AgentCapability, AgentFactory, AgentRole, AgentStatus, ExecutionOutcome, PerformanceReport,
    Recommendation, Vote,
};
use crate::swarm::opportunity::Opportunity;

pub fn sample_opportunity(token: &str) -> Opportunity {
    Opportunity {
        token: token.to_string(),
        source_exchange: "uniswap".to_string(),
        target_exchange: "sushiswap".to_string(),
        source_chain: "ethereum".to_string(),
        target_chain: "polygon".to_string(),
        source_price: Decimal::ONE,
        target_price: Decimal::new(102, 2),
        profit_percentage: 2.0,
        estimated_profit: Decimal::new(20, 0),
        risk_score: 30.0,
        timestamp: Utc::now(),
        source_agent: None,
    }
}

/// Scriptable agent stub. Every knob is interior-mutable so tests can
/// reconfigure an agent the pool already owns.
pub struct StubAgent {
    role: AgentRole,
    status: Mutex<AgentStatus>,
    load: Mutex<f64>,
    success_rate: Mutex<f64>,
    vote: Mutex<Option<Vote>>,
    vote_by_token: Mutex<std::collections::HashMap<String, Vote>>,
    opportunities: Mutex<Vec<Opportunity>>,
    exec_outcome: Mutex<Option<ExecutionOutcome>>,
    exec_delay: Mutex<Option<Duration>>,
    fail_metrics: AtomicBool,
    fail_analyze: AtomicBool,
    fail_opportunities: AtomicBool,
    pub adjust_calls: Mutex<Vec<f64>>,
    pub executed_tokens: Mutex<Vec<String>>,
}

impl StubAgent {
    pub fn new(role: AgentRole) -> Self {
        Self {
            role,
            status: Mutex::new(AgentStatus::Active),
            load: Mutex::new(0.0),
            success_rate: Mutex::new(1.0),
            vote: Mutex::new(None),
            vote_by_token: Mutex::new(std::collections::HashMap::new()),
            opportunities: Mutex::new(Vec::new()),
            exec_outcome: Mutex::new(None),
            exec_delay: Mutex::new(None),
            fail_metrics: AtomicBool::new(false),
            fail_analyze: AtomicBool::new(false),
            fail_opportunities: AtomicBool::new(false),
            adjust_calls: Mutex::new(Vec::new()),
            executed_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, status: AgentStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn set_load(&self, load: f64) {
        *self.load.lock().unwrap() = load;
    }

    pub fn set_success_rate(&self, rate: f64) {
        *self.success_rate.lock().unwrap() = rate;
    }

    pub fn set_vote(&self, recommendation: Recommendation, confidence: f64, reasoning: &str) {
        *self.vote.lock().unwrap() = Some(Vote {
            recommendation,
            confidence,
            reasoning: reasoning.to_string(),
        });
    }

    pub fn set_vote_for(&self, token: &str, recommendation: Recommendation, confidence: f64) {
        self.vote_by_token.lock().unwrap().insert(
            token.to_string(),
            Vote {
                recommendation,
                confidence,
                reasoning: String::new(),
            },
        );
    }

    pub fn set_opportunities(&self, opportunities: Vec<Opportunity>) {
        *self.opportunities.lock().unwrap() = opportunities;
    }

    pub fn set_exec_outcome(&self, success: bool, profit: Decimal) {
        *self.exec_outcome.lock().unwrap() = Some(ExecutionOutcome {
            success,
            profit,
            error: (!success).then(|| "execution reverted".to_string()),
        });
    }

    pub fn set_exec_delay(&self, delay: Duration) {
        *self.exec_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_metrics(&self, fail: bool) {
        self.fail_metrics.store(fail, Ordering::SeqCst);
    }

    pub fn fail_analyze(&self, fail: bool) {
        self.fail_analyze.store(fail, Ordering::SeqCst);
    }

    pub fn fail_opportunities(&self, fail: bool) {
        self.fail_opportunities.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentCapability for StubAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    async fn status(&self) -> AgentStatus {
        *self.status.lock().unwrap()
    }

    async fn opportunities(&self) -> Result<Vec<Opportunity>> {
        if self.fail_opportunities.load(Ordering::SeqCst) {
            return Err(HiveError::Internal("feed unavailable".into()));
        }
        Ok(self.opportunities.lock().unwrap().clone())
    }

    async fn analyze(&self, opportunity: &Opportunity) -> Result<Vote> {
        if self.fail_analyze.load(Ordering::SeqCst) {
            return Err(HiveError::Internal("model offline".into()));
        }
        if let Some(vote) = self.vote_by_token.lock().unwrap().get(&opportunity.token) {
            return Ok(vote.clone());
        }
        Ok(self.vote.lock().unwrap().clone().unwrap_or(Vote {
            recommendation: Recommendation::Skip,
            confidence: 0.0,
            reasoning: String::new(),
        }))
    }

    async fn execute(&self, opportunity: &Opportunity) -> Result<ExecutionOutcome> {
        let delay = *self.exec_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.executed_tokens
            .lock()
            .unwrap()
            .push(opportunity.token.clone());
        Ok(self
            .exec_outcome
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(ExecutionOutcome {
                success: true,
                profit: Decimal::ZERO,
                error: None,
            }))
    }

    async fn performance_metrics(&self) -> Result<PerformanceReport> {
        if self.fail_metrics.load(Ordering::SeqCst) {
            return Err(HiveError::Internal("metrics unavailable".into()));
        }
        Ok(PerformanceReport {
            success_rate: *self.success_rate.lock().unwrap(),
            current_load: *self.load.lock().unwrap(),
        })
    }

    async fn adjust_workload(&self, delta: f64) -> Result<()> {
        self.adjust_calls.lock().unwrap().push(delta);
        let mut load = self.load.lock().unwrap();
        *load = (*load + delta).clamp(0.0, 1.0);
        Ok(())
    }
}

/// Factory that remembers every agent it creates, in creation order, so
/// tests can reach agents the pool owns. Creation order matches the pool's
/// id sequence (ids start at 1).
#[derive(Default)]
pub struct StubFactory {
    created: Mutex<Vec<Arc<StubAgent>>>,
}

impl StubFactory {
    /// Agent by pool id (1-based)
    pub fn agent(&self, id: u64) -> Arc<StubAgent> {
        Arc::clone(&self.created.lock().unwrap()[(id - 1) as usize])
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl AgentFactory for StubFactory {
    fn create(&self, role: AgentRole) -> Arc<dyn AgentCapability> {
        let agent = Arc::new(StubAgent::new(role));
        self.created.lock().unwrap().push(Arc::clone(&agent));
        agent
    }
}
