//! Skillswap - skill-bartering marketplace service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skillswap::{config::Args, db::MongoClient, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    let json_logs = args.json_logs();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("skillswap={},info", log_level).into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Skillswap - skill exchange service");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db '{}')", args.mongodb_uri, args.mongodb_db);
    info!("Session cookie: {}", args.session_cookie);
    info!("CORS origin: {}", args.cors_origin);
    info!("======================================");

    // MongoDB is required in production; dev mode falls back to memory
    let state = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(mongo) => {
            info!("MongoDB connected successfully");
            AppState::with_mongo(args, &mongo).await?
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                AppState::in_memory(args)?
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    server::run(Arc::new(state)).await?;

    Ok(())
}
