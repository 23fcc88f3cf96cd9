mod api;
mod application;
mod config;
mod db;
mod error;
mod events;
mod infrastructure;
mod state;

use anyhow::{Context, Result};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use state::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| "versiongate=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting versiongate");

    let pool = match db::connect_and_migrate(&config.database_url).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to connect to database");
            std::process::exit(1);
        }
    };

    let ctx = match AppContext::new(pool, config.clone()).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to assemble application state");
            std::process::exit(1);
        }
    };

    let report = ctx
        .reconciler
        .reconcile()
        .await
        .context("boot reconciliation failed")?;
    info!(
        deploying_fixed = report.deploying_fixed,
        active_invalidated = report.active_invalidated,
        "boot reconciliation complete"
    );

    let watcher = ctx.watcher.clone();
    tokio::spawn(async move { watcher.run().await });

    let port = config.port;
    let app = axum::Router::new()
        .nest("/api/v1", api::api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;

    info!(port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
