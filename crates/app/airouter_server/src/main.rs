//! airouter server binary.
//!
//! Loads `.env`, reads configuration from the environment and serves the
//! generation gateway until interrupted.

use std::sync::Arc;
use std::time::Duration;

use airouter_api::config::ApiConfig;
use airouter_core::auth::identity::{IdentityStore, MemoryIdentityStore};
use airouter_core::auth::jwt::TokenCodec;
use airouter_core::auth::queries::PgIdentityStore;
use airouter_core::auth::service::TokenService;
use airouter_core::strategy::StrategyRouter;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(
    name = "airouter_server",
    about = "Authenticated streaming gateway for text-generation providers"
)]
struct Args {
    /// Port to listen on on all interfaces; overrides `BIND_ADDR` (default
    /// `0.0.0.0:8080`).
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// PostgreSQL connection URL. Identities are kept in memory when unset.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Upper bound on a single generation stream, in seconds.
    #[arg(
        long,
        env = "GENERATION_TIMEOUT_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    generation_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,airouter_api=debug,airouter_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(port) = args.port {
        config.bind_addr = format!("0.0.0.0:{port}");
    }
    if args.database_url.is_some() {
        config.database_url = args.database_url.clone();
    }
    if let Some(secs) = args.generation_timeout_secs {
        config.generation_timeout = Duration::from_secs(secs);
    }

    info!(
        version = airouter_core::version(),
        bind_addr = %config.bind_addr,
        generation_timeout_secs = config.generation_timeout.as_secs(),
        "starting airouter_server"
    );

    let store: Arc<dyn IdentityStore> = match &config.database_url {
        Some(url) => {
            info!(max_connections = args.max_connections, "configuring connection pool");
            let pool = PgPoolOptions::new()
                .max_connections(args.max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;

            info!("running database migrations");
            airouter_core::migrate::migrate(&pool).await?;
            Arc::new(PgIdentityStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, identities are kept in memory");
            Arc::new(MemoryIdentityStore::new())
        }
    };

    let strategy = StrategyRouter::from_config(reqwest::Client::new(), &config.providers);
    for platform in strategy.platforms() {
        info!(%platform, "platform registered");
    }

    let tokens = TokenService::new(TokenCodec::new(config.jwt_secret.as_bytes()), store);
    let state = airouter_api::AppState {
        config: config.clone(),
        tokens,
        strategy: Arc::new(strategy),
    };

    let app = airouter_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_generation_timeout_is_rejected() {
        let err = Args::try_parse_from(["airouter_server", "--generation-timeout-secs", "0"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let args = Args::try_parse_from(["airouter_server", "--generation-timeout-secs", "45"])
            .unwrap();
        assert_eq!(args.generation_timeout_secs, Some(45));
    }
}
