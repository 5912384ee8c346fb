use std::path::Path;

use anyhow::Result;
use clap::Parser;
use token_cache::cache::token_cache::TokenCache;
use token_cache::config::proc_loader::file_to_config;
use token_cache::server;
use token_cache::sources::client_credentials::ClientCredentialsIssuer;
use token_cache::utils::logging::{self, LogLevel};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "token-cache.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let args = Args::parse();
    let service_config = file_to_config(Path::new(&args.config)).await?;

    // -------------------------------
    // 2. Logging
    // -------------------------------

    let logging_config = logging::resolve_logging(service_config.settings.logging.as_ref(), args.log_level);
    logging::init_logging(&logging_config);

    // -------------------------------
    // 3. Issuer and cache, built once and shared by handle
    // -------------------------------

    let issuer = ClientCredentialsIssuer::new(service_config.issuer.clone())?;
    let cache = TokenCache::new(issuer).with_single_flight(service_config.settings.cache.single_flight);

    // -------------------------------
    // 4. Diagnostic HTTP server
    // -------------------------------

    info!(
        issuer = %service_config.issuer.url,
        single_flight = service_config.settings.cache.single_flight,
        "Service starting..."
    );
    server::server::start(&service_config.settings, cache).await
}
