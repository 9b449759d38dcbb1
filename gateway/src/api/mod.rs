//! Route table (§4.J) — one module per resource group.

pub mod agents;
pub mod backends;
pub mod chat;
pub mod health;
pub mod tools;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/v2/chat/stream", post(chat::chat_stream))
        .route("/v2/chat/clarify", post(chat::clarify))
        .route(
            "/v2/chat/interrupts/:thread_id",
            get(chat::pending_interrupts),
        )
        .route("/v1/agents/register", post(agents::register))
        .route("/v1/agents/heartbeat", post(agents::heartbeat))
        .route("/v1/agents/list", get(agents::list))
        .route("/v1/agents/leader", get(agents::leader))
        .route("/v1/agents/stats", get(agents::stats))
        .route("/v1/agents/dead", delete(agents::purge_dead))
        .route("/v1/agents/all/purge", delete(agents::purge_all))
        .route("/v1/agents/timeout", put(agents::set_timeout))
        .route("/v1/agents/:id", get(agents::get).delete(agents::delete))
        .route("/api/backends", get(backends::list))
        .route("/api/backends/current", get(backends::current))
        .route("/api/backends/invalidate", post(backends::invalidate))
        .route("/v1/tools", get(tools::list))
        .route("/v1/mcp/call", post(tools::call))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&state.config.server.cors))
        .with_state(state)
}

fn build_cors_layer(cors: &agw_domain::config::CorsConfig) -> CorsLayer {
    let origins = &cors.allowed_origins;
    let allow_origin = if origins.len() == 1 && origins[0] == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use agw_backends::BackendRegistry;
    use agw_domain::config::Config;
    use agw_interrupts::InterruptStore;
    use agw_loop::WorkerToolLimits;
    use agw_mcp_client::McpClient;
    use agw_registry::AgentRegistry;

    use super::*;
    use crate::state::ContextPackStore;

    /// Builds the route table against an isolated temp dir; this is the
    /// only way to catch a matchit route-conflict panic (e.g. a static
    /// segment shadowed by a dynamic one), since that only surfaces when
    /// the router is actually constructed, not at compile time.
    #[test]
    fn router_builds_without_route_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.registry.persistence_path = dir.path().join("agents.json").display().to_string();
        config.interrupts.state_dir = dir.path().join("interrupts").display().to_string();

        let state = AppState {
            config: Arc::new(config.clone()),
            backends: Arc::new(BackendRegistry::new(
                HashMap::new(),
                vec![],
                std::time::Duration::from_secs(1),
            )),
            mcp: Arc::new(McpClient::new(&config.mcp)),
            registry: Arc::new(AgentRegistry::new(&config.registry).unwrap()),
            interrupts: Arc::new(InterruptStore::new(&config.interrupts)),
            tool_limits: Arc::new(WorkerToolLimits::new()),
            context_packs: Arc::new(ContextPackStore::new()),
        };

        let _router = build_router(state);
    }
}
