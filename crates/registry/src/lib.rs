//! Agent registry: registration, heartbeats, leader election, JSON
//! persistence (§4.G).
//!
//! A single lock covers every mutation and every read; operations are
//! O(#agents), which the spec calls out as an acceptable tradeoff for the
//! expected scale of a handful of worker agents per gateway instance.

use agw_domain::agent::{generate_agent_id, Agent, AgentRole, AgentStatus};
use agw_domain::config::{RegistryConfig, MIN_HEARTBEAT_TIMEOUT_MS};
use agw_domain::error::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Default)]
pub struct RegistryStats {
    pub total: usize,
    pub leader_id: Option<String>,
    pub idle: usize,
    pub busy: usize,
}

#[derive(Serialize, Deserialize)]
struct PersistedState {
    leader_id: Option<String>,
    heartbeat_timeout: i64,
    agents: HashMap<String, Agent>,
    updated_at: DateTime<Utc>,
}

struct State {
    leader_id: Option<String>,
    heartbeat_timeout_ms: i64,
    agents: HashMap<String, Agent>,
}

pub struct AgentRegistry {
    state: RwLock<State>,
    persistence_path: PathBuf,
}

impl AgentRegistry {
    /// Load persisted state if present, then reset every loaded agent's
    /// heartbeat to now (startup grace period, §9).
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let path = PathBuf::from(&config.persistence_path);
        let mut agents = HashMap::new();
        let mut leader_id = None;

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let persisted: PersistedState = serde_json::from_str(&raw)?;
            agents = persisted.agents;
            leader_id = persisted.leader_id;
        }

        let now = Utc::now();
        for agent in agents.values_mut() {
            agent.last_heartbeat = now;
        }

        let registry = Self {
            state: RwLock::new(State {
                leader_id,
                heartbeat_timeout_ms: config.heartbeat_timeout_ms.max(MIN_HEARTBEAT_TIMEOUT_MS),
                agents,
            }),
            persistence_path: path,
        };
        registry.persist_locked(&registry.state.read())?;
        Ok(registry)
    }

    /// §4.G registration algorithm.
    pub fn register(
        &self,
        model_name: &str,
        role: Option<AgentRole>,
        capabilities: Vec<String>,
        agent_id: Option<String>,
        pty_session_id: Option<String>,
    ) -> Result<(Agent, String)> {
        let mut state = self.state.write();
        let now = Utc::now();
        self.reap_locked(&mut state, now);

        if let Some(id) = &agent_id {
            if state.agents.contains_key(id) {
                let promote = {
                    let existing = state.agents.get_mut(id).unwrap();
                    existing.last_heartbeat = now;
                    existing.is_leader_eligible()
                };
                if promote && state.leader_id.is_none() {
                    state.leader_id = Some(id.clone());
                    state.agents.get_mut(id).unwrap().role = AgentRole::Leader;
                }
                let agent = state.agents.get(id).unwrap().clone();
                self.persist_locked(&state)?;
                return Ok((agent, "re-registered (idempotent)".to_string()));
            }
        }

        let id = agent_id.unwrap_or_else(|| generate_agent_id(model_name, now));
        let (final_role, message) = match role {
            Some(AgentRole::Leader) if state.leader_id.is_none() => {
                state.leader_id = Some(id.clone());
                (AgentRole::Leader, "registered as leader".to_string())
            }
            Some(AgentRole::Leader) => (
                AgentRole::Worker,
                format!("leader already registered ({}); registered as worker", state.leader_id.clone().unwrap()),
            ),
            _ => (AgentRole::Worker, "registered as worker".to_string()),
        };

        let agent = Agent {
            agent_id: id.clone(),
            model_name: model_name.to_string(),
            role: final_role,
            status: AgentStatus::Idle,
            capabilities,
            current_task_id: None,
            pty_session_id,
            last_heartbeat: now,
            registered_at: now,
        };
        state.agents.insert(id, agent.clone());
        self.persist_locked(&state)?;
        tracing::info!(agent_id = %agent.agent_id, role = ?agent.role, "agent registered");
        Ok((agent, message))
    }

    pub fn heartbeat(&self, agent_id: &str, status: Option<AgentStatus>, current_task_id: Option<String>) -> Result<Agent> {
        let mut state = self.state.write();
        let now = Utc::now();
        self.reap_locked(&mut state, now);

        let agent = state.agents.get_mut(agent_id).ok_or_else(|| Error::UnknownAgent(agent_id.to_string()))?;
        agent.last_heartbeat = now;
        if let Some(s) = status {
            agent.status = s;
        }
        if let Some(task) = current_task_id {
            agent.current_task_id = Some(task);
        }
        let result = agent.clone();
        self.persist_locked(&state)?;
        Ok(result)
    }

    pub fn deregister(&self, agent_id: &str) -> Result<()> {
        let mut state = self.state.write();
        let now = Utc::now();
        self.reap_locked(&mut state, now);

        if state.agents.remove(agent_id).is_none() {
            return Err(Error::UnknownAgent(agent_id.to_string()));
        }
        if state.leader_id.as_deref() == Some(agent_id) {
            state.leader_id = None;
            promote_locked(&mut state);
        }
        self.persist_locked(&state)?;
        Ok(())
    }

    pub fn update_role(&self, agent_id: &str, new_role: AgentRole) -> Result<Agent> {
        let mut state = self.state.write();
        let now = Utc::now();
        self.reap_locked(&mut state, now);

        if !state.agents.contains_key(agent_id) {
            return Err(Error::UnknownAgent(agent_id.to_string()));
        }

        match new_role {
            AgentRole::Leader => {
                if let Some(prev) = state.leader_id.clone() {
                    if prev != agent_id {
                        if let Some(prev_agent) = state.agents.get_mut(&prev) {
                            prev_agent.role = AgentRole::Worker;
                        }
                    }
                }
                state.leader_id = Some(agent_id.to_string());
            }
            AgentRole::Worker => {
                if state.leader_id.as_deref() == Some(agent_id) {
                    state.leader_id = None;
                }
            }
        }
        state.agents.get_mut(agent_id).unwrap().role = new_role;
        let result = state.agents.get(agent_id).unwrap().clone();
        self.persist_locked(&state)?;
        Ok(result)
    }

    pub fn get(&self, agent_id: &str) -> Option<Agent> {
        let mut state = self.state.write();
        self.reap_locked(&mut state, Utc::now());
        state.agents.get(agent_id).cloned()
    }

    /// `include_dead` is accepted for API parity with §4.G, but dead agents
    /// are deleted at reap time and so never appear regardless.
    pub fn list_all(&self, _include_dead: bool) -> Vec<Agent> {
        let mut state = self.state.write();
        self.reap_locked(&mut state, Utc::now());
        state.agents.values().cloned().collect()
    }

    pub fn get_leader(&self) -> Result<Agent> {
        let mut state = self.state.write();
        self.reap_locked(&mut state, Utc::now());
        state
            .leader_id
            .as_ref()
            .and_then(|id| state.agents.get(id).cloned())
            .ok_or(Error::NoLeader)
    }

    pub fn get_workers(&self, status: Option<AgentStatus>) -> Vec<Agent> {
        let mut state = self.state.write();
        self.reap_locked(&mut state, Utc::now());
        state
            .agents
            .values()
            .filter(|a| a.role == AgentRole::Worker)
            .filter(|a| status.map(|s| a.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut state = self.state.write();
        self.reap_locked(&mut state, Utc::now());
        let mut stats = RegistryStats { total: state.agents.len(), leader_id: state.leader_id.clone(), ..Default::default() };
        for agent in state.agents.values() {
            match agent.status {
                AgentStatus::Idle => stats.idle += 1,
                AgentStatus::Busy => stats.busy += 1,
                AgentStatus::Dead => {}
            }
        }
        stats
    }

    /// Explicit reap pass; returns the number of agents removed.
    pub fn purge_dead(&self) -> usize {
        let mut state = self.state.write();
        self.reap_locked(&mut state, Utc::now())
    }

    /// Updates the heartbeat timeout used by subsequent reap passes.
    /// Floored at 100ms (§3): anything lower would mark every agent dead
    /// on the next reap, since `Agent::is_alive` checks `age_ms < timeout`.
    pub fn set_heartbeat_timeout_ms(&self, heartbeat_timeout_ms: i64) {
        let mut state = self.state.write();
        state.heartbeat_timeout_ms = heartbeat_timeout_ms.max(MIN_HEARTBEAT_TIMEOUT_MS);
        let _ = self.persist_locked(&state);
    }

    /// Clears the registry entirely; returns the number of agents removed.
    pub fn purge_all(&self) -> usize {
        let mut state = self.state.write();
        let count = state.agents.len();
        state.agents.clear();
        state.leader_id = None;
        let _ = self.persist_locked(&state);
        count
    }

    fn reap_locked(&self, state: &mut State, now: DateTime<Utc>) -> usize {
        let timeout = state.heartbeat_timeout_ms;
        let dead_ids: Vec<String> = state
            .agents
            .iter()
            .filter(|(_, a)| !a.is_alive(now, timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &dead_ids {
            state.agents.remove(id);
            if state.leader_id.as_deref() == Some(id) {
                state.leader_id = None;
            }
            tracing::info!(agent_id = %id, "agent reaped (heartbeat timeout)");
        }

        if state.leader_id.is_none() {
            promote_locked(state);
        }

        if !dead_ids.is_empty() {
            let _ = self.persist_locked(state);
        }
        dead_ids.len()
    }

    fn persist_locked(&self, state: &State) -> Result<()> {
        if let Some(parent) = self.persistence_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let persisted = PersistedState {
            leader_id: state.leader_id.clone(),
            heartbeat_timeout: state.heartbeat_timeout_ms,
            agents: state.agents.clone(),
            updated_at: Utc::now(),
        };
        let raw = serde_json::to_string_pretty(&persisted)?;
        std::fs::write(&self.persistence_path, raw)?;
        Ok(())
    }
}

/// Promote the lexicographically-first alive `leader_*`-eligible agent.
/// No-op if a leader is already set or no candidate exists.
fn promote_locked(state: &mut State) {
    if state.leader_id.is_some() {
        return;
    }
    let mut candidates: Vec<String> = state.agents.iter().filter(|(_, a)| a.is_leader_eligible()).map(|(id, _)| id.clone()).collect();
    candidates.sort();
    if let Some(id) = candidates.into_iter().next() {
        state.leader_id = Some(id.clone());
        if let Some(agent) = state.agents.get_mut(&id) {
            agent.role = AgentRole::Leader;
        }
        tracing::info!(agent_id = %id, "agent auto-promoted to leader");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir, heartbeat_timeout_ms: i64) -> RegistryConfig {
        RegistryConfig { persistence_path: dir.path().join("agents.json").to_string_lossy().to_string(), heartbeat_timeout_ms }
    }

    #[test]
    fn register_without_role_becomes_worker() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, 30_000)).unwrap();
        let (agent, _) = registry.register("claude", None, vec![], None, None).unwrap();
        assert_eq!(agent.role, AgentRole::Worker);
    }

    #[test]
    fn first_leader_request_is_granted() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, 30_000)).unwrap();
        let (agent, msg) = registry.register("claude", Some(AgentRole::Leader), vec![], None, None).unwrap();
        assert_eq!(agent.role, AgentRole::Leader);
        assert!(msg.contains("leader"));
        assert_eq!(registry.get_leader().unwrap().agent_id, agent.agent_id);
    }

    #[test]
    fn second_leader_request_demoted_to_worker() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, 30_000)).unwrap();
        registry.register("claude", Some(AgentRole::Leader), vec![], None, None).unwrap();
        let (second, msg) = registry.register("gpt", Some(AgentRole::Leader), vec![], None, None).unwrap();
        assert_eq!(second.role, AgentRole::Worker);
        assert!(msg.contains("already registered"));
    }

    #[test]
    fn set_heartbeat_timeout_floors_non_positive_values() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, 30_000)).unwrap();
        let (agent, _) = registry.register("claude", None, vec![], None, None).unwrap();
        registry.set_heartbeat_timeout_ms(0);
        // A 0ms timeout would mark every agent dead immediately (age_ms < 0
        // is never true); the floor keeps a just-registered agent alive.
        assert_eq!(registry.purge_dead(), 0);
        assert!(registry.get(&agent.agent_id).is_some());
    }

    #[test]
    fn constructor_floors_non_positive_configured_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, -5)).unwrap();
        let (agent, _) = registry.register("claude", None, vec![], None, None).unwrap();
        assert_eq!(registry.purge_dead(), 0);
        assert!(registry.get(&agent.agent_id).is_some());
    }

    #[test]
    fn leader_uniqueness_holds_across_many_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, 30_000)).unwrap();
        for i in 0..10 {
            registry.register(&format!("m{i}"), Some(AgentRole::Leader), vec![], None, None).unwrap();
        }
        let leaders = registry.list_all(false).into_iter().filter(|a| a.role == AgentRole::Leader).count();
        assert_eq!(leaders, 1);
    }

    #[test]
    fn idempotent_reregister_updates_heartbeat_only() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, 30_000)).unwrap();
        let (first, _) = registry.register("claude", None, vec![], Some("fixed_id".into()), None).unwrap();
        let (second, msg) = registry.register("claude", None, vec![], Some("fixed_id".into()), None).unwrap();
        assert_eq!(first.agent_id, second.agent_id);
        assert!(msg.contains("idempotent"));
    }

    #[test]
    fn dead_agent_is_reaped_and_leader_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, MIN_HEARTBEAT_TIMEOUT_MS)).unwrap();
        registry.register("claude", None, vec![], Some("leader_claude".into()), None).unwrap();
        registry.update_role("leader_claude", AgentRole::Leader).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(150));
        registry.register("gpt", None, vec![], Some("leader_gpt".into()), None).unwrap();

        assert_eq!(registry.list_all(true).len(), 1);
        assert_eq!(registry.get_leader().unwrap().agent_id, "leader_gpt");
    }

    #[test]
    fn purge_dead_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, MIN_HEARTBEAT_TIMEOUT_MS)).unwrap();
        registry.register("claude", None, vec![], None, None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(150));
        let first = registry.purge_dead();
        let second = registry.purge_dead();
        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert!(registry.list_all(true).is_empty());
    }

    #[test]
    fn heartbeat_on_unknown_agent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, 30_000)).unwrap();
        let err = registry.heartbeat("ghost", None, None).unwrap_err();
        assert!(matches!(err, Error::UnknownAgent(_)));
    }

    #[test]
    fn get_leader_with_no_leader_is_no_leader_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, 30_000)).unwrap();
        let err = registry.get_leader().unwrap_err();
        assert!(matches!(err, Error::NoLeader));
    }

    #[test]
    fn state_survives_reload_with_heartbeat_reset() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir, 30_000);
        {
            let registry = AgentRegistry::new(&cfg).unwrap();
            registry.register("claude", Some(AgentRole::Leader), vec![], Some("leader_claude".into()), None).unwrap();
        }
        let reopened = AgentRegistry::new(&cfg).unwrap();
        assert_eq!(reopened.get_leader().unwrap().agent_id, "leader_claude");
    }

    #[test]
    fn purge_all_clears_everything() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentRegistry::new(&config(&dir, 30_000)).unwrap();
        registry.register("a", None, vec![], None, None).unwrap();
        registry.register("b", None, vec![], None, None).unwrap();
        let count = registry.purge_all();
        assert_eq!(count, 2);
        assert!(registry.list_all(true).is_empty());
    }
}
