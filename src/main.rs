use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cloudflare_exporter::api;
use cloudflare_exporter::config::{Cli, Config};
use cloudflare_exporter::metrics::MetricRegistry;
use cloudflare_exporter::provider::{AnalyticsProvider, CloudflareClient};
use cloudflare_exporter::scrape::ScrapeOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration; unknown denylist entries and missing credentials stop here
    let config = Config::from_cli(Cli::parse())?;
    info!("Loaded configuration");

    for metric in config.denylist.iter() {
        info!("Metric {} is denylisted and will not be exported", metric);
    }
    let registry = Arc::new(
        MetricRegistry::new(&config.denylist).context("failed to register metrics")?,
    );

    info!(
        "Authenticating with Cloudflare using {} credentials",
        config.provider.credentials.mode()
    );
    let provider: Arc<dyn AnalyticsProvider> = Arc::new(CloudflareClient::new(
        config.provider.credentials.clone(),
        config.provider.api_url.clone(),
        config.provider.graphql_url.clone(),
        config.scrape.query_timeout,
    )?);

    let router = api::create_metrics_router(Arc::clone(&registry), &config.server.metrics_path);
    let listener = tokio::net::TcpListener::bind(config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;
    info!(
        "🚀 Serving metrics on http://{}{}",
        config.server.listen, config.server.metrics_path
    );

    info!(
        "Scraping {} request path(s) every {:?} with a {}s delay",
        config.scrape.request_paths.len(),
        config.scrape.interval,
        config.scrape.scrape_delay_secs
    );
    let orchestrator = ScrapeOrchestrator::new(provider, registry, config.scrape.clone());

    // Exposition and scraping run side by side; either one ending stops the process
    tokio::select! {
        served = axum::serve(listener, router) => served.context("metrics server failed")?,
        scraped = orchestrator.run() => scraped.context("scrape loop stopped")?,
    }

    Ok(())
}
