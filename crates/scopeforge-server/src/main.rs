//! ScopeForge server binary: wire configuration into the orchestrator and
//! serve the HTTP surface.

use anyhow::Context;
use clap::Parser;
use directories::BaseDirs;
use log::info;
use scopeforge_config::ForgeConfig;
use scopeforge_core::planner::{Planner, RemotePlanner};
use scopeforge_core::store::build_session_store;
use scopeforge_core::Orchestrator;
use scopeforge_server::{AppState, build_router};
use scopeforge_steps::{
    CompletionOracle, HttpCompletionOracle, LocalObjectStore, ObjectStore, StaticOracle,
    StaticRateSheet, StepContext, builtin_step_registry,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "scopeforge-server", about = "Proposal generation workflow service")]
struct Args {
    /// Path to a JSON5 config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bind address override, e.g. 0.0.0.0:8080.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ForgeConfig::load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ForgeConfig::default(),
    };
    let listen = match args.listen {
        Some(listen) => listen,
        None => format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .context("invalid server.host/server.port")?,
    };

    let store = build_session_store(&config.storage).context("initializing session store")?;
    let templates: Arc<dyn ObjectStore> = Arc::new(
        LocalObjectStore::new(resolve_root(config.objects.templates_root.as_deref(), "templates"))
            .context("initializing template store")?,
    );
    let artifacts: Arc<dyn ObjectStore> = Arc::new(
        LocalObjectStore::new(resolve_root(config.objects.artifacts_root.as_deref(), "artifacts"))
            .context("initializing artifact store")?,
    );
    let oracle: Arc<dyn CompletionOracle> = match &config.oracle.endpoint {
        Some(endpoint) => Arc::new(HttpCompletionOracle::new(
            endpoint.clone(),
            config.oracle.model_id.clone(),
        )),
        None => Arc::new(StaticOracle::default()),
    };
    let rates = match &config.storage.rate_sheet_path {
        Some(path) => {
            StaticRateSheet::from_path(path).context("loading rate sheet")?
        }
        None => StaticRateSheet::standard(),
    };

    let ctx = Arc::new(StepContext {
        store: store.clone(),
        oracle,
        templates: templates.clone(),
        artifacts,
        rates: Arc::new(rates),
        signed_url_ttl: Duration::from_secs(config.objects.signed_url_ttl_secs),
    });
    let registry = Arc::new(builtin_step_registry(ctx));

    let planner: Option<Arc<dyn Planner>> = config.planner.endpoint.as_ref().map(|endpoint| {
        Arc::new(RemotePlanner::new(
            endpoint.clone(),
            config.planner.agent_id.clone().unwrap_or_default(),
            config.planner.agent_alias_id.clone().unwrap_or_default(),
        )) as Arc<dyn Planner>
    });

    let orchestrator = Arc::new(Orchestrator::new(config, store, registry, planner)?);
    let router = build_router(AppState {
        orchestrator,
        templates,
    });

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .context("binding server listener")?;
    info!("scopeforge-server listening on http://{listen}");
    axum::serve(listener, router)
        .await
        .context("server terminated with error")
}

/// Resolve an object store root from config or the default data directory.
fn resolve_root(configured: Option<&str>, leaf: &str) -> PathBuf {
    if let Some(root) = configured {
        return PathBuf::from(root);
    }
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(".scopeforge").join(leaf),
        None => PathBuf::from(".scopeforge-data").join(leaf),
    }
}
