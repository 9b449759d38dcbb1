//! Human-in-the-loop interrupt store (§4.H).
//!
//! In-memory per-thread maps mirrored to `<state_dir>/<thread_id>/<id>.json`,
//! loaded lazily the first time a thread is touched.

use agw_domain::config::InterruptStoreConfig;
use agw_domain::error::{Error, Result};
use agw_domain::interrupt::{InterruptPayload, InterruptReason, InterruptResponse, PendingInterrupt, ResumePayload};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

pub struct InterruptStore {
    state_dir: PathBuf,
    threads: RwLock<HashMap<String, HashMap<String, PendingInterrupt>>>,
    loaded: RwLock<HashSet<String>>,
}

impl InterruptStore {
    pub fn new(config: &InterruptStoreConfig) -> Self {
        Self { state_dir: PathBuf::from(&config.state_dir), threads: RwLock::new(HashMap::new()), loaded: RwLock::new(HashSet::new()) }
    }

    /// Fails unless `agent_role == "leader"` (§4.H, §8 "interrupt authorization").
    #[allow(clippy::too_many_arguments)]
    pub fn create_interrupt(
        &self,
        thread_id: &str,
        run_id: &str,
        question: String,
        reason: InterruptReason,
        options: Option<Vec<String>>,
        input_type: String,
        agent_id: Option<String>,
        agent_role: &str,
        context: Option<Value>,
        proposal: Option<Value>,
    ) -> Result<PendingInterrupt> {
        if agent_role != "leader" {
            return Err(Error::InterruptAuthorization);
        }
        self.ensure_loaded(thread_id);

        let interrupt = PendingInterrupt {
            interrupt_id: format!("int_{}", uuid::Uuid::new_v4().simple()),
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
            reason,
            payload: InterruptPayload { question, options, input_type, context, proposal },
            agent_id,
            agent_role: agent_role.to_string(),
            created_at: Utc::now(),
            expires_at: None,
            response: None,
            resolved: false,
        };

        self.threads.write().entry(thread_id.to_string()).or_default().insert(interrupt.interrupt_id.clone(), interrupt.clone());
        self.persist(&interrupt)?;
        tracing::info!(thread_id, interrupt_id = %interrupt.interrupt_id, "interrupt created");
        Ok(interrupt)
    }

    pub fn get_pending(&self, thread_id: &str) -> Vec<PendingInterrupt> {
        self.ensure_loaded(thread_id);
        self.threads
            .read()
            .get(thread_id)
            .map(|m| m.values().filter(|i| !i.resolved).cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_interrupt(&self, thread_id: &str, interrupt_id: &str) -> Option<PendingInterrupt> {
        self.ensure_loaded(thread_id);
        self.threads.read().get(thread_id).and_then(|m| m.get(interrupt_id)).cloned()
    }

    /// Returns `None` if the interrupt doesn't exist; returns the existing
    /// response unchanged if it was already resolved (idempotent).
    pub fn resolve_interrupt(
        &self,
        thread_id: &str,
        interrupt_id: &str,
        answer: String,
        modifications: Option<Value>,
    ) -> Result<Option<ResumePayload>> {
        self.ensure_loaded(thread_id);

        let resolved_copy = {
            let mut threads = self.threads.write();
            let Some(map) = threads.get_mut(thread_id) else { return Ok(None) };
            let Some(interrupt) = map.get_mut(interrupt_id) else { return Ok(None) };

            if !interrupt.resolved {
                interrupt.resolved = true;
                interrupt.response = Some(InterruptResponse { answer, modifications, resolved_at: Utc::now() });
            }
            interrupt.clone()
        };

        self.persist(&resolved_copy)?;
        let response = resolved_copy.response.expect("just set or already resolved");
        Ok(Some(ResumePayload {
            interrupt_id: resolved_copy.interrupt_id,
            thread_id: resolved_copy.thread_id,
            answer: response.answer,
            modifications: response.modifications,
        }))
    }

    pub fn clear_thread(&self, thread_id: &str) -> usize {
        self.ensure_loaded(thread_id);
        let count = self.threads.write().remove(thread_id).map(|m| m.len()).unwrap_or(0);

        let dir = self.thread_dir(thread_id);
        if dir.exists() {
            let _ = std::fs::remove_dir_all(&dir);
        }
        self.loaded.write().remove(thread_id);
        count
    }

    fn ensure_loaded(&self, thread_id: &str) {
        if self.loaded.read().contains(thread_id) {
            return;
        }
        let mut loaded = self.loaded.write();
        if loaded.contains(thread_id) {
            return;
        }

        let mut map = HashMap::new();
        let dir = self.thread_dir(thread_id);
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Ok(raw) = std::fs::read_to_string(entry.path()) {
                    if let Ok(interrupt) = serde_json::from_str::<PendingInterrupt>(&raw) {
                        map.insert(interrupt.interrupt_id.clone(), interrupt);
                    }
                }
            }
        }

        self.threads.write().insert(thread_id.to_string(), map);
        loaded.insert(thread_id.to_string());
    }

    fn thread_dir(&self, thread_id: &str) -> PathBuf {
        self.state_dir.join(thread_id)
    }

    fn persist(&self, interrupt: &PendingInterrupt) -> Result<()> {
        let dir = self.thread_dir(&interrupt.thread_id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", interrupt.interrupt_id));
        std::fs::write(path, serde_json::to_string_pretty(interrupt)?)?;
        Ok(())
    }
}
