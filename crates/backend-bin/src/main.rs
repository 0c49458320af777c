use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gameauth_lib::{
    config::{LogFormat, Settings},
    create_admin_router, create_router, AppState, Sweeper,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Game-platform authentication service
#[derive(Debug, Parser)]
#[command(name = "gameauth", version, about)]
struct Args {
    /// Settings file (defaults to ./gameauth.toml when present)
    #[arg(short, long, env = "GAMEAUTH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured listen address
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

fn init_tracing(settings: &Settings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match settings.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::load().context("loading settings")?,
    };
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }

    init_tracing(&settings);

    let bind_addr = settings.bind_addr;
    let admin_addr = settings.admin_bind_addr;
    let sweep_interval = settings.session.sweep_interval();

    let state = AppState::from_settings(settings).await.context("building application state")?;
    let sweeper = Sweeper::start(state.clone(), sweep_interval);
    let app = create_router(state.clone());
    let admin = create_admin_router(state);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    let admin_listener = TcpListener::bind(admin_addr)
        .await
        .with_context(|| format!("binding admin listener {admin_addr}"))?;
    info!(addr = %bind_addr, admin_addr = %admin_addr, "listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let admin_server = tokio::spawn(async move {
        axum::serve(admin_listener, admin)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
    });

    let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = shutdown_tx.send(true);
    match admin_server.await {
        Ok(Err(e)) => tracing::error!(error = %e, "admin listener failed"),
        Err(e) => tracing::error!(error = %e, "admin listener task panicked"),
        Ok(Ok(())) => {},
    }
    sweeper.stop().await;
    served?;
    info!("server stopped");
    Ok(())
}
