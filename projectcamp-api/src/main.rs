//! # ProjectCamp API Server
//!
//! REST backend for ProjectCamp: accounts with email verification and password
//! reset, projects with role-based membership, tasks and subtasks.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/projectcamp \
//! ACCESS_TOKEN_SECRET=... REFRESH_TOKEN_SECRET=... \
//! cargo run -p projectcamp-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON logs and `RUST_LOG` to change the filter.

use anyhow::Context;
use projectcamp_api::{
    app::{build_router, AppState},
    config::Config,
    mailer::HttpMailer,
};
use projectcamp_shared::{
    mail::{LogMailer, Mailer},
    store::{postgres::PgStore, DynStore},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!(
        "ProjectCamp API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let store: DynStore = Arc::new(
        PgStore::connect(config.database.pool_config())
            .await
            .context("Failed to connect to the database")?,
    );

    let mailer: Arc<dyn Mailer> = match &config.mail.api_url {
        Some(url) => Arc::new(HttpMailer::new(
            url.clone(),
            config.mail.api_key.clone(),
            config.mail.from.clone(),
        )?),
        None => {
            warn!("MAIL_API_URL is not set; outgoing mail will only be logged");
            Arc::new(LogMailer)
        }
    };

    let address = config.bind_address();
    let state = AppState::new(store.clone(), mailer, config);
    let app = build_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close().await;
    info!("Server shutdown completed");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "projectcamp_api=debug,projectcamp_shared=debug,tower_http=debug".into()
    });

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C listener failed");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM listener failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections...");
}
