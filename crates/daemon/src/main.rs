//! Rubix daemon - queue ticketing coordinator with SMS notifications

mod logging;
mod settings;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use rubix_core::application::{shutdown_channel, Rubix, SmsWorker, TicketResetScheduler};
use rubix_core::port::ticket_letter::RandomLetterProvider;
use rubix_core::port::time_provider::SystemTimeProvider;
use rubix_infra_amqp::{AmqpConnection, AmqpMessageSource, AmqpPublisher};
use rubix_infra_sms::NandiSmsGateway;
use settings::{Environment, Settings};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let settings = Settings::load()?;
    logging::init_logging(settings.environment)?;

    info!("Rubix v{} starting...", rubix_core::VERSION);
    if settings.environment == Environment::Development {
        info!(settings = ?settings.redacted(), "Loaded configuration");
    }
    let reset_at = settings.reset_time()?;

    // 2. Broker connection
    let connection = AmqpConnection::connect(settings.amqp_config())
        .await
        .context("RabbitMQ connection failed")?;

    // 3. Coordinator
    let publisher = Arc::new(AmqpPublisher::new(connection.clone()));
    let rubix = Arc::new(Rubix::new(
        publisher,
        Arc::new(RandomLetterProvider),
        settings.coordinator_config(),
    ));
    rubix.preload_queues(settings.queue_ids.iter().copied());

    // 4. Notification worker
    let gateway = NandiSmsGateway::new(settings.sms_gateway_url.clone(), settings.sms_timeout())
        .context("SMS gateway client setup failed")?;
    let worker = SmsWorker::new(
        Arc::new(AmqpMessageSource::new(connection.clone())),
        Arc::new(gateway),
        settings.worker_config(),
    );

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let worker_handle = rubix.register_notification_worker(Arc::new(worker), shutdown_rx)?;

    // 5. Daily ticket reset
    let scheduler = TicketResetScheduler::new(rubix.clone(), Arc::new(SystemTimeProvider), reset_at);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_tx.token()));

    info!(queues = ?rubix.queue_ids(), "System ready");

    // 6. Wait for shutdown signal
    wait_for_signal().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    shutdown_tx.shutdown();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, worker_handle).await.is_err() {
        warn!("Notification worker did not stop in time");
    }
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, scheduler_handle).await.is_err() {
        warn!("Reset scheduler did not stop in time");
    }
    connection.close().await;

    info!("Shutdown complete.");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!(error = %e, "Ctrl+C handler failed");
            }
        }
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
