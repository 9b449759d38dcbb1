//! Process-wide per-worker tool-call limit registry (§4.F constructor inputs).

use parking_lot::RwLock;
use std::collections::HashMap;

/// Clamp a non-zero limit into `[1, 50]`; `0` stays unlimited.
fn clamp(n: u32) -> u32 {
    if n == 0 {
        0
    } else {
        n.clamp(1, 50)
    }
}

/// Shared across requests: lets an operator cap a specific worker's budget
/// independently of the gateway-wide default.
#[derive(Default)]
pub struct WorkerToolLimits {
    limits: RwLock<HashMap<String, u32>>,
}

impl WorkerToolLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, worker_id: impl Into<String>, limit: u32) {
        self.limits.write().insert(worker_id.into(), limit);
    }

    pub fn get(&self, worker_id: &str) -> Option<u32> {
        self.limits.read().get(worker_id).copied()
    }

    pub fn clear(&self, worker_id: &str) {
        self.limits.write().remove(worker_id);
    }

    /// Resolution order: explicit argument → per-worker limit → environment
    /// default → unlimited. The result is always clamped.
    pub fn resolve(&self, explicit: Option<u32>, worker_id: Option<&str>, env_default: u32) -> u32 {
        let raw = explicit
            .or_else(|| worker_id.and_then(|w| self.get(w)))
            .unwrap_or(env_default);
        clamp(raw)
    }
}
