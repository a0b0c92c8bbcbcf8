//! Lattice - professional network REST backend

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lattice::{
    auth::SessionValidator,
    config::Args,
    db::mongo::MongoClient,
    email::Mailer,
    server::{self, AppState},
    services::ImageHost,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lattice={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Lattice - professional network API");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Client: {}", args.client_url);
    info!("Session expiry: {}s", args.jwt_expiry_seconds);
    info!("======================================");

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let sessions = match SessionValidator::new(args.jwt_secret().to_string(), args.jwt_expiry_seconds) {
        Ok(validator) => validator,
        Err(e) => {
            error!("Session configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let mailer = Mailer::spawn(&args);
    let images = ImageHost::new(&args);

    let state = Arc::new(AppState {
        args,
        mongo,
        sessions,
        mailer,
        images,
    });

    server::run(state).await?;

    Ok(())
}
