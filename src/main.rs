mod api;
mod catalog;
mod config;
mod error;
mod fetcher;
mod portfolio_loader;
mod query;
mod reconciler;
mod scorer;
mod state;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::HttpSource;
use crate::portfolio_loader::{PortfolioLoader, SharedCurve};
use crate::scorer::TieredRewardCurve;
use crate::state::PortfolioStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!(
        subgraph = %cfg.subgraph_url,
        income_subgraph = %cfg.income_subgraph_url,
        inventory = %cfg.inventory_api_url,
        chain_reader = %cfg.chain_reader_url,
        "upstreams configured",
    );

    let store = PortfolioStore::new();
    let source = Arc::new(HttpSource::new(&cfg)?);
    let curve: SharedCurve = Arc::new(TieredRewardCurve::default());
    let loader = PortfolioLoader::new(Arc::clone(&store), source, curve);

    // --- HTTP API ---
    let app = router(ApiState { loader });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
