//! civic-ie - Interactive Element Engine service
//!
//! Resolves bootstrap configuration, opens (and migrates) the database and
//! serves the element API over HTTP.

use anyhow::Result;
use clap::Parser;
use civic_common::config::ConfigOverrides;
use civic_common::EventBus;
use civic_ie::services::RetryPolicy;
use civic_ie::{build_router, logging, AppState};
use std::path::PathBuf;
use tracing::{error, info};

/// Event bus capacity; slower SSE clients see `Lagged` instead of blocking
const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "civic-ie", version, about = "Civic reader interactive element engine")]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "CIVIC_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "CIVIC_DATABASE")]
    database: Option<PathBuf>,

    /// Bind host
    #[arg(long, env = "CIVIC_HOST")]
    host: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "CIVIC_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CIVIC_LOG_LEVEL")]
    log_level: Option<String>,
}

impl From<Args> for ConfigOverrides {
    fn from(args: Args) -> Self {
        Self {
            config_file: args.config,
            database_path: args.database,
            host: args.host,
            port: args.port,
            log_level: args.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let overrides = ConfigOverrides::from(Args::parse());

    let config = logging::resolve_config(&overrides, std::io::stdout)?;

    logging::init_tracing(&config.logging.level);

    info!(
        "Starting civic-ie v{} ({})",
        env!("CARGO_PKG_VERSION"),
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );
    info!("Database path: {}", config.database_path.display());

    let pool = match civic_common::db::init_database(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let retry = RetryPolicy::from(config.submit_retry);
    info!(
        max_retries = retry.max_retries,
        base_delay_ms = retry.base_delay.as_millis() as u64,
        "Submission retry policy"
    );

    let state = AppState::new(pool, EventBus::new(EVENT_BUS_CAPACITY), retry);
    let app = build_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("civic-ie listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}
