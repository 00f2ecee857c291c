use std::sync::Arc;

use anyhow::Context;
use support_intake::{
    catalog::DirectoryCatalog,
    config::Settings,
    handlers, logging,
    models::AppState,
    producer::{KafkaPublisher, Publisher},
};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info,support_intake=debug");

    // Config
    let settings = Settings::load().context("Failed to load configuration")?;
    settings.kafka.log_startup();

    // Setup
    let publisher: Arc<dyn Publisher> = Arc::new(
        KafkaPublisher::new(&settings.kafka).context("Failed to create Kafka producer")?,
    );
    let app_state = AppState {
        catalog: Arc::new(DirectoryCatalog::new(&settings.intake_dir)),
        publisher: Arc::clone(&publisher),
        topic: settings.kafka.topic.clone(),
        broker: settings.kafka.summary(),
    };

    let app = handlers::app(app_state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("Failed to bind to port {}", settings.port))?;
    info!("Server running on http://localhost:{}", settings.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down gracefully...");
    publisher.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
