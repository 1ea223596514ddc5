mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use sest_api::AppStateInner;
use sest_db::Database;
use sest_engine::Coordinator;
use sest_notify::{PostmarkTransport, ReactionDispatcher, ReactionQueue, TracingTransport, Transport};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sest=debug,sest_api=debug,sest_engine=debug,sest_notify=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {}", e);
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);

    let transport = match &config.postmark_token {
        Some(token) => {
            info!("Notifications go through Postmark at {}", config.postmark_url);
            Transport::Postmark(PostmarkTransport::new(
                config.postmark_url.clone(),
                token.clone(),
                config.from_address.clone(),
            ))
        }
        None => {
            info!("SEST_POSTMARK_TOKEN unset, notifications are only logged");
            Transport::Tracing(TracingTransport)
        }
    };

    // Reactions run on their own task; ingestion never waits for them.
    let (queue, reactions) = ReactionQueue::new(config.dispatch_queue);
    let worker = tokio::spawn(sest_notify::run_dispatch_loop(ReactionDispatcher::new(transport), reactions));

    let state = Arc::new(AppStateInner {
        db: db.clone(),
        coordinator: Coordinator::new(db, queue),
        jwt_secret: config.jwt_secret.clone(),
        max_fields: config.max_fields,
        records_page: config.records_page,
    });

    let app = sest_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("SEST listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    // The router held the last queue sender; let the worker finish what is queued.
    if let Err(e) = worker.await {
        error!("Dispatch worker panicked: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
