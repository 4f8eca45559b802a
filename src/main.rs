mod admin;
mod cli;
mod codegen;
mod config;
mod error;
mod lease;
mod models;
mod routes;
mod store;

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use clap::Parser;
use cli::{Cli, Command};
use config::{Config, StoreBackend};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use admin::AdminGate;
use error::AppError;
use lease::{Clock, LeaseManager, SystemClock};
use store::{LeaseStore, MemoryLeaseStore, PgLeaseStore};

#[derive(Clone)]
pub struct AppState {
    pub leases: LeaseManager,
    pub admin: AdminGate,
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.leases.health().await?;
    Ok(Json(json!({ "status": "ok", "store": true })))
}

async fn open_store(config: &Config) -> Arc<dyn LeaseStore> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; codes and sessions are lost on exit");
            Arc::new(MemoryLeaseStore::new())
        }
        StoreBackend::Postgres => {
            let store = PgLeaseStore::connect(&config.database_url, config.store_timeout)
                .await
                .expect("failed to connect to database");
            store.migrate().await.expect("failed to run migrations");
            Arc::new(store)
        }
    }
}

async fn serve(config: &Config, state: AppState) {
    let mut app = Router::new()
        .route("/api/health", get(health))
        .merge(routes::api_router());

    if let Some(dir) = &config.static_dir {
        app = app.merge(routes::frontend::router(dir));
        tracing::info!("serving static files from {dir}");
    }

    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}

fn exit_on_error(result: Result<(), AppError>) {
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Cli::parse();
    let config = Config::from_env();

    if config.admin_secret.is_none() {
        tracing::warn!("ADMIN_SECRET_KEY is not set; admin operations are disabled");
    }

    let store = open_store(&config).await;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = AppState {
        leases: LeaseManager::new(
            store.clone(),
            clock.clone(),
            config.session_timeout,
            config.store_timeout,
        ),
        admin: AdminGate::new(
            store,
            clock,
            config.admin_secret.clone(),
            config.store_timeout,
        ),
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, state).await,
        Command::Issue { referrer, name } => exit_on_error(
            cli::issue(&state.admin, referrer.as_deref(), name.as_deref()).await,
        ),
        Command::Deactivate { code } => exit_on_error(cli::deactivate(&state.admin, &code).await),
    }
}
