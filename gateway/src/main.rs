mod api;
mod cli;
mod error;
mod state;

use std::sync::Arc;

use agw_interrupts::InterruptStore;
use agw_loop::WorkerToolLimits;
use agw_mcp_client::McpClient;
use agw_registry::AgentRegistry;
use clap::Parser;

use crate::cli::{Cli, Command, ConfigCommand};
use crate::state::{AppState, ContextPackStore};

fn init_tracing() {
    tracing_subscriber::fmt().json().with_target(true).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            init_tracing();
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_server())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, path) = cli::load_config()?;
            if cli::config::validate(&config, &path) {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
        Command::Version => {
            println!("gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_server() -> anyhow::Result<()> {
    let (config, path) = cli::load_config()?;
    let issues = config.validate();
    for issue in &issues {
        tracing::warn!(field = %issue.field, severity = ?issue.severity, "{}", issue);
    }
    if issues
        .iter()
        .any(|i| i.severity == agw_domain::config::ConfigSeverity::Error)
    {
        anyhow::bail!("invalid configuration in {path}, refusing to start");
    }

    let backends = agw_backends::build_registry(&config)?;
    let mcp = McpClient::new(&config.mcp);
    let registry = AgentRegistry::new(&config.registry)?;
    let interrupts = InterruptStore::new(&config.interrupts);

    let state = AppState {
        config: Arc::new(config.clone()),
        backends: Arc::new(backends),
        mcp: Arc::new(mcp),
        registry: Arc::new(registry),
        interrupts: Arc::new(interrupts),
        tool_limits: Arc::new(WorkerToolLimits::new()),
        context_packs: Arc::new(ContextPackStore::new()),
    };

    let app = api::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(%addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
