//! Agent Pool — owned, id-indexed arena of worker agents
//!
//! The pool owns every agent's structural lifecycle: creation at init or
//! scale-up, eviction at scale-down, role accounting. Domain behavior lives
//! behind the injected `AgentCapability` handles.
//!
//! All mutation happens under a single writer lock scoped to the mutation
//! itself; scans clone records/handles out and release the lock before any
//! collaborator call.

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::swarm::agent::{
    AgentCapability, AgentFactory, AgentId, AgentRecord, AgentRole, AgentStatus,
};

/// Default role for agents added outside of role-targeted initialization
const DEFAULT_SCALE_ROLE: AgentRole = AgentRole::ArbitrageDetection;

/// Result of a removal request. Removal completes partially rather than
/// failing when role coverage would be violated.
#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    pub requested: usize,
    pub removed: Vec<AgentId>,
}

impl RemoveOutcome {
    pub fn is_partial(&self) -> bool {
        self.removed.len() < self.requested
    }
}

struct PoolEntry {
    record: AgentRecord,
    handle: Arc<dyn AgentCapability>,
}

struct PoolInner {
    next_id: u64,
    // BTreeMap keeps iteration in id (creation) order for tie-breaks
    entries: BTreeMap<AgentId, PoolEntry>,
}

impl PoolInner {
    fn spawn(&mut self, role: AgentRole, factory: &dyn AgentFactory) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        let handle = factory.create(role);
        self.entries.insert(
            id,
            PoolEntry {
                record: AgentRecord {
                    id,
                    role,
                    status: AgentStatus::Active,
                    current_load: 0.0,
                    success_rate: 1.0,
                    created_at: Utc::now(),
                },
                handle,
            },
        );
        id
    }

    fn role_count(&self, role: AgentRole) -> usize {
        self.entries.values().filter(|e| e.record.role == role).count()
    }
}

/// Owned pool of worker agents
pub struct AgentPool {
    max_agents: usize,
    factory: Arc<dyn AgentFactory>,
    inner: RwLock<PoolInner>,
}

impl AgentPool {
    pub fn new(max_agents: usize, factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            max_agents,
            factory,
            inner: RwLock::new(PoolInner {
                next_id: 1,
                entries: BTreeMap::new(),
            }),
        }
    }

    pub fn max_agents(&self) -> usize {
        self.max_agents
    }

    /// Populate the pool up to `max_agents`, assigning roles by the fixed
    /// priority order so every role is represented at least once before any
    /// role gets a second agent.
    pub async fn initialize(&self) {
        let mut inner = self.inner.write().await;
        let mut created = 0usize;
        while inner.entries.len() < self.max_agents {
            let role = AgentRole::PRIORITY[created % AgentRole::PRIORITY.len()];
            inner.spawn(role, self.factory.as_ref());
            created += 1;
        }
        info!(agents = created, "agent pool initialized");
    }

    /// Append up to `n` agents of the default scale-up role, clamped to the
    /// remaining capacity. Returns how many were actually added.
    pub async fn add(&self, n: usize) -> usize {
        let mut inner = self.inner.write().await;
        let capacity = self.max_agents.saturating_sub(inner.entries.len());
        let to_add = n.min(capacity);
        for _ in 0..to_add {
            let id = inner.spawn(DEFAULT_SCALE_ROLE, self.factory.as_ref());
            debug!(%id, role = %DEFAULT_SCALE_ROLE, "agent added to pool");
        }
        if to_add < n {
            warn!(
                requested = n,
                added = to_add,
                "scale-up clamped to max_agents"
            );
        }
        to_add
    }

    /// Evict up to `n` agents, lowest success_rate first, ties broken by
    /// earliest creation. Never evicts the last agent of any role; when role
    /// coverage blocks eviction the outcome is partial, not an error.
    pub async fn remove(&self, n: usize) -> RemoveOutcome {
        let mut inner = self.inner.write().await;

        let mut candidates: Vec<(f64, AgentId, AgentRole)> = inner
            .entries
            .values()
            .map(|e| (e.record.success_rate, e.record.id, e.record.role))
            .collect();
        // AgentId order is creation order, so the secondary key is "oldest first"
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));

        let mut removed = Vec::new();
        for (_, id, role) in candidates {
            if removed.len() == n {
                break;
            }
            if inner.role_count(role) <= 1 {
                continue;
            }
            inner.entries.remove(&id);
            debug!(%id, %role, "agent evicted from pool");
            removed.push(id);
        }

        if removed.len() < n {
            warn!(
                requested = n,
                removed = removed.len(),
                "scale-down stopped early to preserve role coverage"
            );
        }
        RemoveOutcome {
            requested: n,
            removed,
        }
    }

    /// Lowest-loaded active execution agent; ties broken by ascending id.
    pub async fn select_execution_agent(&self) -> Option<(AgentId, Arc<dyn AgentCapability>)> {
        let inner = self.inner.read().await;
        inner
            .entries
            .values()
            .filter(|e| e.record.role == AgentRole::Execution && e.record.status.is_active())
            // BTreeMap iteration is id-ascending, so min_by on load alone
            // keeps the lowest id among ties
            .min_by(|a, b| {
                a.record
                    .current_load
                    .partial_cmp(&b.record.current_load)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|e| (e.record.id, Arc::clone(&e.handle)))
    }

    /// Poll every agent's reported status and performance and fold the
    /// results into the records. Per-agent failures leave the last known
    /// values in place.
    pub async fn sync_performance(&self) {
        let polled: Vec<(AgentId, Arc<dyn AgentCapability>)> = {
            let inner = self.inner.read().await;
            inner
                .entries
                .values()
                .map(|e| (e.record.id, Arc::clone(&e.handle)))
                .collect()
        };

        let reports = join_all(polled.iter().map(|(id, handle)| async move {
            let status = handle.status().await;
            let metrics = handle.performance_metrics().await;
            (*id, status, metrics)
        }))
        .await;

        let mut inner = self.inner.write().await;
        for (id, status, metrics) in reports {
            let Some(entry) = inner.entries.get_mut(&id) else {
                continue; // evicted while polling
            };
            entry.record.status = status;
            match metrics {
                Ok(report) => {
                    entry.record.success_rate = report.success_rate.clamp(0.0, 1.0);
                    entry.record.current_load = report.current_load.clamp(0.0, 1.0);
                }
                Err(e) => {
                    warn!(%id, error = %e, "performance poll failed; keeping last known stats");
                }
            }
        }
    }

    /// Cloned records for lock-free downstream computation
    pub async fn snapshot(&self) -> Vec<AgentRecord> {
        let inner = self.inner.read().await;
        inner.entries.values().map(|e| e.record.clone()).collect()
    }

    /// Active agents with their handles, in id order
    pub async fn active_agents(&self) -> Vec<(AgentId, Arc<dyn AgentCapability>)> {
        let inner = self.inner.read().await;
        inner
            .entries
            .values()
            .filter(|e| e.record.status.is_active())
            .map(|e| (e.record.id, Arc::clone(&e.handle)))
            .collect()
    }

    pub async fn handle_of(&self, id: AgentId) -> Option<Arc<dyn AgentCapability>> {
        let inner = self.inner.read().await;
        inner.entries.get(&id).map(|e| Arc::clone(&e.handle))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
