//! rostrum - multi-model debate server
//!
//! Two language models argue a topic across four phases, a judge model
//! rules, and every token streams to the client over SSE.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use rostrum::config::{AppConfig, mask_key};
use rostrum::provider::registry::PROVIDER_REGISTRY;
use rostrum::server::create_router;
use rostrum::state::AppState;

#[derive(Parser)]
#[command(name = "rostrum")]
#[command(about = "Multi-model debate server with live SSE streaming")]
struct Args {
    /// Bind host
    #[arg(long, env = "ROSTRUM_HOST")]
    host: Option<String>,

    /// Bind port
    #[arg(long, env = "ROSTRUM_PORT")]
    port: Option<u16>,

    /// Database URL (sqlite)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    log_key_availability();
    info!(
        pro = %config.pro_model,
        con = %config.con_model,
        judge = %config.judge_model,
        web_search = config.search_enabled(),
        "rostrum v{} starting",
        env!("CARGO_PKG_VERSION"),
    );

    let state = AppState::init(config).await?;
    let bind_address = state.config.bind_address();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("listening on http://{bind_address}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Log which provider keys are present, masked.
fn log_key_availability() {
    for spec in PROVIDER_REGISTRY {
        match std::env::var(spec.env_var) {
            Ok(key) if !key.trim().is_empty() => {
                info!(provider = spec.id, key = %mask_key(&key), "api key set");
            }
            _ => info!(provider = spec.id, env_var = spec.env_var, "api key missing"),
        }
    }
}
