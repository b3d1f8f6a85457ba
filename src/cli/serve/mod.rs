//! Serve command - gateway, startup provisioning and backend supervision

use std::io;
use std::net::SocketAddr;
use std::process::ExitStatus;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::api::router::create_router;
use crate::config::AppConfig;
use crate::domain::{Manifest, ProvisionError, StatusTracker};
use crate::infrastructure::logging;
use crate::infrastructure::orchestrator::{Initializer, ProvisionReport, SupervisedProcess};

type ServerHandle = JoinHandle<io::Result<()>>;
type InitHandle = JoinHandle<Result<(ProvisionReport, SupervisedProcess), ProvisionError>>;

enum Startup {
    Finished(Result<Result<(ProvisionReport, SupervisedProcess), ProvisionError>, JoinError>),
    Interrupted,
    ServerStopped(Result<io::Result<()>, JoinError>),
}

enum Running {
    BackendExited(Result<ExitStatus, ProvisionError>),
    Interrupted,
    ServerStopped(Result<io::Result<()>, JoinError>),
}

/// Run the sidecar until the backend exits or a shutdown signal arrives
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let manifest = Manifest::load(&config.paths.nodes_manifest, &config.paths.models_manifest).await?;

    let status = Arc::new(StatusTracker::new());
    let provisioning = crate::create_provisioning_service(&config, status.clone())?;
    let state = crate::create_app_state(&config, status.clone(), provisioning.clone())?;
    let app = create_router(state, &config.paths.index_file);

    let addr = build_socket_addr(&config)?;
    let listener = TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        backend = %config.backend.proxy_url,
        "Starting sidecar gateway"
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut server: ServerHandle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_stop(stop_rx))
            .await
    });

    let backend = config.backend.clone();
    let initializer = Initializer::new(provisioning, status, manifest);
    let mut init: InitHandle = tokio::spawn(async move { initializer.run(&backend).await });

    let signal = shutdown_signal();
    tokio::pin!(signal);

    let startup = tokio::select! {
        joined = &mut init => Startup::Finished(joined),
        _ = &mut signal => Startup::Interrupted,
        served = &mut server => Startup::ServerStopped(served),
    };

    let process = match startup {
        Startup::Finished(Ok(Ok((report, process)))) => {
            info!(
                failures = report.failure_count(),
                pid = ?process.id(),
                "Initialization finished, backend running"
            );
            process
        }
        Startup::Finished(Ok(Err(e))) => {
            error!(error = %e, "Backend could not be started");
            stop_server(&stop_tx, server).await?;
            return Err(e.into());
        }
        Startup::Finished(Err(e)) => {
            stop_server(&stop_tx, server).await?;
            return Err(e.into());
        }
        Startup::Interrupted => {
            info!("Shutdown requested during initialization");
            init.abort();
            return stop_server(&stop_tx, server).await;
        }
        Startup::ServerStopped(served) => {
            init.abort();
            return Err(server_failure(served));
        }
    };

    supervise(process, &config, &stop_tx, server, signal.as_mut()).await
}

async fn supervise(
    mut process: SupervisedProcess,
    config: &AppConfig,
    stop_tx: &watch::Sender<bool>,
    mut server: ServerHandle,
    mut signal: std::pin::Pin<&mut impl std::future::Future<Output = ()>>,
) -> anyhow::Result<()> {
    let running = tokio::select! {
        exited = process.wait() => Running::BackendExited(exited),
        _ = &mut signal => Running::Interrupted,
        served = &mut server => Running::ServerStopped(served),
    };

    match running {
        Running::BackendExited(exited) => {
            stop_server(stop_tx, server).await?;
            let status = exited?;
            if !status.success() {
                anyhow::bail!("backend exited with {}", status);
            }
            info!("Backend exited, sidecar stopped");
            Ok(())
        }
        Running::Interrupted => {
            stop_server(stop_tx, server).await?;
            let status = process.shutdown(config.backend.shutdown_grace()).await?;
            info!(status = %status, "Backend stopped, sidecar shutdown complete");
            Ok(())
        }
        Running::ServerStopped(served) => {
            warn!("Gateway stopped unexpectedly, stopping backend");
            if let Err(e) = process.shutdown(config.backend.shutdown_grace()).await {
                error!(error = %e, "Backend shutdown failed");
            }
            Err(server_failure(served))
        }
    }
}

async fn wait_for_stop(mut stop: watch::Receiver<bool>) {
    // A dropped sender also means stop
    let _ = stop.wait_for(|stopped| *stopped).await;
}

async fn stop_server(stop_tx: &watch::Sender<bool>, server: ServerHandle) -> anyhow::Result<()> {
    stop_tx.send_replace(true);
    server.await??;
    info!("Gateway stopped");
    Ok(())
}

fn server_failure(served: Result<io::Result<()>, JoinError>) -> anyhow::Error {
    match served {
        Ok(Ok(())) => anyhow::anyhow!("gateway stopped unexpectedly"),
        Ok(Err(e)) => e.into(),
        Err(e) => e.into(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}
