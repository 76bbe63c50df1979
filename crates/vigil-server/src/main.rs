//! Vigil ops server.
//!
//! Serves `/metrics` and `/healthz` on `ops.listen`; stops on Ctrl-C / SIGTERM.

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use vigil_server::{app_state, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, kind = e.kind().as_str(), "vigil-server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> vigil_core::Result<()> {
    let path = std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "vigil.yaml".to_string());
    let cfg = config::load(&path, |k| std::env::var(k).ok())?;
    let listen = cfg.ops.listen_addr()?;

    let state = app_state::AppState::new(cfg)?;
    let telemetry = std::sync::Arc::clone(state.telemetry());
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| vigil_core::VigilError::Lifecycle(format!("bind {listen} failed: {e}")))?;

    telemetry.start()?;
    tracing::info!(%listen, "vigil ops server starting");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    telemetry.shutdown();
    served.map_err(|e| vigil_core::VigilError::Lifecycle(format!("server failed: {e}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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
    tracing::info!("signal received, starting graceful shutdown");
}
