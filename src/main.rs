use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use doto::{
    appsettings::AppSettings,
    http,
    scheduling::DispatchScheduler,
    storage::{EventStorage, InMemoryEventStorage},
    telegram::TelegramNotifier,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const SERVER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();

    let settings = AppSettings::load().context("Could not load settings")?;
    log::debug!("Starting the application");

    let notifier = TelegramNotifier::connect(&settings.telegram.token).await?;
    let storage: Arc<dyn EventStorage> = Arc::new(InMemoryEventStorage::new());
    let scheduler = DispatchScheduler::new(
        Arc::clone(&storage),
        Arc::new(notifier),
        settings.scheduler.max_tasks_per_worker,
        settings.scheduler.poll_interval(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    log::info!("Listening on {addr}");

    let shutdown = CancellationToken::new();
    let server_shutdown = CancellationToken::new();
    let server = http::spawn_server(listener, Arc::clone(&storage), server_shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            log::info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    scheduler.run(shutdown).await;

    server_shutdown.cancel();
    match tokio::time::timeout(SERVER_SHUTDOWN_GRACE, server).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => log::error!("Server task failed: {error}"),
        Err(_) => log::warn!("Server did not shut down within {SERVER_SHUTDOWN_GRACE:?}"),
    }

    log::debug!("Application was stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            log::error!("Could not listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::quit()), signal(SignalKind::terminate())) {
            (Ok(mut quit), Ok(mut terminate)) => {
                tokio::select! {
                    _ = quit.recv() => {},
                    _ = terminate.recv() => {},
                }
            }
            _ => {
                log::error!("Could not install SIGQUIT/SIGTERM handlers");
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
}
