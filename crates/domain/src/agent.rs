//! Agent registry data model (§3 "Agent", §4.G).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Leader,
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub model_name: String,
    pub role: AgentRole,
    pub status: AgentStatus,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub current_task_id: Option<String>,
    #[serde(default)]
    pub pty_session_id: Option<String>,
    pub last_heartbeat: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    /// An agent's id prefix `leader_*` marks it as leader-eligible for
    /// auto-promotion (§4.G reap algorithm, §9 "Auto-promotion rule").
    pub fn is_leader_eligible(&self) -> bool {
        self.agent_id.starts_with("leader_")
    }

    pub fn is_alive(&self, now: DateTime<Utc>, heartbeat_timeout_ms: i64) -> bool {
        let age_ms = now
            .signed_duration_since(self.last_heartbeat)
            .num_milliseconds();
        age_ms < heartbeat_timeout_ms
    }
}

/// Generate an agent id of the form `{model}_{YYYYMMDD_HHMMSS}_{8-hex}`.
pub fn generate_agent_id(model_name: &str, now: DateTime<Utc>) -> String {
    let hex: String = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    format!("{}_{}_{}", model_name, now.format("%Y%m%d_%H%M%S"), hex)
}
