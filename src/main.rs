use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use pdfgate::config::Config;
use pdfgate::convert::{CommandRenderer, Renderer};
use pdfgate::server::PdfServer;

/// pdfgate - HTML to PDF conversion API with caching, rate limiting and live metrics
#[derive(Parser, Debug)]
#[command(name = "pdfgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    config.validate().context("Invalid configuration")?;

    if args.test {
        println!("Configuration is valid");
        return Ok(());
    }

    pdfgate::logging::init_subscriber(&config.logging)
        .context("Failed to initialize logging subsystem")?;

    tracing::info!(
        config_file = ?args.config,
        server_address = %config.server.address,
        server_port = config.server.port,
        cache_enabled = config.cache.enabled,
        cache_max_entries = config.cache.max_entries,
        rate_limit_enabled = config.rate_limit.enabled,
        renderer = %config.conversion.renderer.command,
        "Configuration loaded successfully"
    );

    let renderer: Arc<dyn Renderer> =
        Arc::new(CommandRenderer::from_config(&config.conversion.renderer));

    let server = PdfServer::from_config(&config, renderer)
        .context("Failed to initialize metrics registry")?;
    server.run().await.context("Server error")?;

    Ok(())
}
