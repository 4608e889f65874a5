use std::{process, sync::Arc};

use herald::{
    application::error::AppError,
    cache::CacheConfig,
    config,
    dispatch::{AttachmentJobQueue, DelayedMessageQueue, DispatchPoller, PollerConfig, QueueKeys},
    infra::{error::InfraError, sender::LoggingSender, store, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, causes = ?error.chain(), "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, causes = ?error.chain(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let durable = store::open(&settings.store).await?;
    let keys = QueueKeys::from(&settings.store);

    let cache_config = CacheConfig::from(&settings.cache);
    for region in cache_config.regions() {
        info!(
            region = %region.name,
            policy = %region.policy,
            ttl_secs = region.ttl.as_secs(),
            "Cache region declared"
        );
    }

    let poller = Arc::new(DispatchPoller::new(
        DelayedMessageQueue::new(durable.clone(), &keys),
        AttachmentJobQueue::new(durable, &keys),
        Arc::new(LoggingSender),
        PollerConfig::from(&settings.dispatch),
    ));

    let handle = poller.spawn(shutdown_signal());
    handle
        .await
        .map_err(|err| AppError::unexpected(format!("dispatch poller task failed: {err}")))?;

    info!("Herald stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => {
            let err = InfraError::from(err);
            warn!(error = %err, "Failed to listen for shutdown signal; stopping");
        }
    }
}
