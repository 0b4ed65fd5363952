use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracker_core::Database;
use tracker_core::seed::{seed_expenses, seed_tasks};

use crate::api::AppState;
use crate::config::{Cli, Service};

mod api;
mod config;
mod expenses;
mod tasks;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let db_path = match cli.db_path {
        Some(path) => path,
        None => Database::default_path(cli.service.db_file())?,
    };
    let db = Database::connect(&db_path).await?;

    if !cli.no_seed {
        seed(&db, cli.service).await;
    }

    let app = api::app(AppState { db }, cli.service);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, service = ?cli.service, "tracker listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("tracker stopped");
    Ok(())
}

/// Loads sample rows into an empty table. Failures are logged and the
/// service keeps running on whatever data it has.
async fn seed(db: &Database, service: Service) {
    let result = match service {
        Service::Tasks => seed_tasks(db).await,
        Service::Expenses => seed_expenses(db).await,
    };
    if let Err(err) = result {
        error!(error = %err, service = ?service, "failed to seed sample data");
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use super::*;
    use crate::api::test_support::{app_for, send};

    #[tokio::test]
    async fn seed_failure_is_swallowed() {
        let db = Database::in_memory().await.unwrap();
        db.pool().close().await;
        seed(&db, Service::Tasks).await;
        seed(&db, Service::Expenses).await;

        let (app, _db) = app_for(Service::Tasks).await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn seed_fills_an_empty_store() {
        let (_app, db) = app_for(Service::Expenses).await;
        seed(&db, Service::Expenses).await;
        assert_eq!(db.count_expenses().await.unwrap(), 15);
    }
}
