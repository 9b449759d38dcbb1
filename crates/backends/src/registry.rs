//! Backend registry: named construction, health caching, circuit breaker,
//! and chain-based fallback selection (§4.B).

use crate::traits::{Backend, Health};
use agw_domain::circuit::CircuitState;
use agw_domain::error::{Error, Result};
use agw_domain::trace::TraceEvent;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct HealthCacheEntry {
    health: Health,
    fetched_at: Instant,
}

const HEALTH_CACHE_TTL: Duration = Duration::from_secs(10);

/// Holds every configured backend plus the circuit/health bookkeeping used
/// by [`BackendRegistry::get_healthy_backend`].
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
    chain: Vec<String>,
    probe_timeout: Duration,
    circuits: RwLock<HashMap<String, CircuitState>>,
    health_cache: RwLock<HashMap<String, HealthCacheEntry>>,
    last_healthy: RwLock<Option<String>>,
}

impl BackendRegistry {
    pub fn new(backends: HashMap<String, Arc<dyn Backend>>, chain: Vec<String>, probe_timeout: Duration) -> Self {
        Self {
            backends,
            chain,
            probe_timeout,
            circuits: RwLock::new(HashMap::new()),
            health_cache: RwLock::new(HashMap::new()),
            last_healthy: RwLock::new(None),
        }
    }

    pub fn list_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_backend(&self, name: &str) -> Result<Arc<dyn Backend>> {
        self.backends.get(name).cloned().ok_or_else(|| Error::UnknownBackend(name.to_string()))
    }

    pub fn get_backends_chain(&self) -> &[String] {
        &self.chain
    }

    pub async fn health_check_all(&self) -> HashMap<String, Health> {
        let mut out = HashMap::new();
        for (name, backend) in &self.backends {
            out.insert(name.clone(), backend.health().await);
        }
        out
    }

    pub fn get_circuit_states(&self) -> HashMap<String, CircuitState> {
        self.circuits.read().clone()
    }

    /// Force a re-probe on next selection: drops the cached health result
    /// and closes the circuit breaker (§8), so an operator-triggered
    /// invalidation lets `get_healthy_backend` pick the backend back up
    /// before its `open_until` window would otherwise elapse.
    pub fn invalidate_health_cache(&self, name: Option<&str>) {
        match name {
            Some(n) => {
                self.health_cache.write().remove(n);
                if let Some(circuit) = self.circuits.write().get_mut(n) {
                    circuit.invalidate();
                }
            }
            None => {
                self.health_cache.write().clear();
                for circuit in self.circuits.write().values_mut() {
                    circuit.invalidate();
                }
            }
        }
    }

    /// Selection algorithm (§4.B): walk the chain in order, skip open
    /// circuits, reuse fresh cached health, otherwise run a bounded probe.
    /// Remember the first healthy backend as `last_healthy` and return it.
    pub async fn get_healthy_backend(&self) -> Result<Arc<dyn Backend>> {
        let now = Utc::now();

        for (position, name) in self.chain.iter().enumerate() {
            let Some(backend) = self.backends.get(name) else {
                continue;
            };

            if self.circuits.read().get(name).is_some_and(|c| c.is_open(now)) {
                continue;
            }

            let cached = self.health_cache.read().get(name).and_then(|entry| {
                if entry.fetched_at.elapsed() < HEALTH_CACHE_TTL {
                    Some(entry.health.ok)
                } else {
                    None
                }
            });

            let healthy = match cached {
                Some(ok) => ok,
                None => {
                    let health = tokio::time::timeout(self.probe_timeout, backend.health())
                        .await
                        .unwrap_or_else(|_| Health::unhealthy("health probe timed out"));
                    let ok = health.ok;
                    self.health_cache.write().insert(name.clone(), HealthCacheEntry { health, fetched_at: Instant::now() });
                    self.record_probe(name, ok, now);
                    ok
                }
            };

            if healthy {
                let mut last = self.last_healthy.write();
                if last.as_deref() != Some(name.as_str()) {
                    TraceEvent::BackendSelected { backend: name.clone(), chain_position: position }.emit();
                }
                *last = Some(name.clone());
                return self.get_backend(name);
            }
        }

        Err(Error::NoHealthyBackend)
    }

    fn record_probe(&self, name: &str, ok: bool, now: chrono::DateTime<Utc>) {
        let mut circuits = self.circuits.write();
        let circuit = circuits.entry(name.to_string()).or_default();
        if ok {
            if circuit.consecutive_failures > 0 {
                TraceEvent::CircuitClosed { backend: name.to_string() }.emit();
            }
            circuit.record_success(now);
        } else {
            circuit.record_failure(now);
            if circuit.is_open(now) {
                let open_for_secs = if circuit.consecutive_failures >= 4 {
                    agw_domain::circuit::OPEN_DURATION_LONG_SECS as u64
                } else {
                    agw_domain::circuit::OPEN_DURATION_SHORT_SECS as u64
                };
                TraceEvent::CircuitOpened {
                    backend: name.to_string(),
                    consecutive_failures: circuit.consecutive_failures,
                    open_for_secs,
                }
                .emit();
            }
        }
    }
}
