use anyhow::{Context, Result};
use clap::Parser;
use indexbrowser::api::ApiServer;
use indexbrowser::config::{Config, ObservabilityConfig};
use indexbrowser::{MemoryBackend, ResultsBrowser, SearchBackend};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "indexbrowser-server")]
#[command(about = "Read-only browser for full-text search indexes")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "INDEXBROWSER_CONFIG", default_value = "indexbrowser.toml")]
    config: String,

    /// Address to bind to, overriding server.bind_addr
    #[arg(short, long)]
    bind: Option<String>,

    /// Serve the bundled sample corpus on the default connection
    #[arg(long)]
    demo: bool,
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| observability.log_level.clone()),
    );
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| observability.log_format.clone());

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = Path::new(&args.config);
    let config = Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    init_tracing(&config.observability);

    tracing::info!("Config file: {}", args.config);
    if !config_path.exists() {
        tracing::warn!("Config file not found, running with defaults");
    }

    let backend: Arc<dyn SearchBackend> = if args.demo {
        tracing::info!("Serving the bundled sample corpus");
        Arc::new(MemoryBackend::sample())
    } else {
        Arc::new(
            MemoryBackend::from_fixtures(&config.backend.fixtures)
                .context("Failed to load search fixtures")?,
        )
    };

    let browser = ResultsBrowser::from_config(&config, backend)
        .context("Invalid search backend configuration")?;
    tracing::info!(
        version = ?browser.profile().version(),
        per_page = browser.per_page(),
        "Search backend ready"
    );

    let addr = args.bind.unwrap_or_else(|| config.server.bind_addr.clone());
    let server = ApiServer::new(browser, &config);
    server.serve(&addr).await?;

    Ok(())
}
