//! region-select service entry point

use region_select::{Config, Service};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "region_select=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║                region-select v0.1.0                       ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = Config::from_env();
    info!("Configuration:");
    info!("  App:      {}", config.app_name);
    info!("  Region:   {}", config.self_region);
    info!("  Zone:     {}", config.zone);
    info!("  Interval: {:?}", config.interval);
    info!("  Window:   {}", config.window_size);
    info!("  Bind:     {}", config.bind_addr);

    let service = Service::new(config)?;
    service.run(shutdown_signal()).await?;

    Ok(())
}

/// Waits for the first interrupt/terminate signal to resolve (triggering
/// graceful drain); a second signal forces an immediate exit so an operator
/// is never stuck waiting on a stuck connection.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining connections");

    tokio::spawn(async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
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
            _ = ctrl_c => {}
            _ = terminate => {}
        }
        info!("second shutdown signal received, forcing exit");
        std::process::exit(1);
    });
}
