//! Human-in-the-loop interrupt data model (§3 "Pending Interrupt", §4.H).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptReason {
    Clarification,
    HumanApproval,
    UploadRequired,
    PolicyHold,
    ErrorRecovery,
    PlanReview,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptPayload {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub input_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptResponse {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Value>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInterrupt {
    pub interrupt_id: String,
    pub thread_id: String,
    pub run_id: String,
    pub reason: InterruptReason,
    pub payload: InterruptPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub agent_role: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<InterruptResponse>,
    #[serde(default)]
    pub resolved: bool,
}

/// What `resolve_interrupt` returns to the caller on success: enough
/// information for the agent loop to resume the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ResumePayload {
    pub interrupt_id: String,
    pub thread_id: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Value>,
}
