//! kobu-server - Watu Kobu debt collection API
//!
//! Startup order: bootstrap TOML, tracing, build identification, data folder,
//! database, runtime settings, HTTP listener.

use anyhow::{Context, Result};
use clap::Parser;
use kobu_common::config::{database_path, load_toml_config, resolve_data_folder, TomlConfig};
use kobu_common::db::{get_parsed, init_database, load_evidence_policy, load_notice_days};
use kobu_common::EventBus;
use kobu_server::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Event bus capacity used when the setting is missing
const DEFAULT_EVENT_BUS_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "kobu-server", version, about = "Watu Kobu debt collection API")]
struct Args {
    /// Bootstrap TOML file (default: platform config folder)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding kobu.db (overrides KOBU_DATA_FOLDER and the TOML file)
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "KOBU_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "KOBU_PORT")]
    port: Option<u16>,
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log filter")?;

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, config_source) = load_toml_config(args.config.as_deref())?;
    init_tracing(&config)?;
    config_source.log();

    info!(
        "Starting Watu Kobu server (kobu-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let data_folder = resolve_data_folder(args.data_folder.as_deref(), &config);
    let db_path = database_path(&data_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    // Fail fast on bad thresholds rather than at the first report
    let policy = load_evidence_policy(&pool).await?;
    info!(
        "Evidence thresholds: {} min delay, {} m distance, {} min future tolerance",
        policy.max_report_delay_minutes,
        policy.max_visit_distance_meters,
        policy.future_tolerance_minutes
    );
    let notice_days = load_notice_days(&pool).await?;
    info!("Demand letter notice period: {} days", notice_days);

    let capacity = get_parsed(&pool, "event_bus_capacity", DEFAULT_EVENT_BUS_CAPACITY).await?;
    let events = Arc::new(EventBus::new(capacity));

    let state = AppState::new(pool, events, config.company_name.clone());
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.bind_address);
    let port = args.port.unwrap_or(config.port);
    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot listen on {}", addr))?;
    info!("kobu-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
