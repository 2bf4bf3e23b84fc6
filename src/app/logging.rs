use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_logging(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    // The consumer runs on its own named thread, so keep thread names in the output.
    let initialized = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_thread_names(true))
        .try_init();

    match initialized {
        Ok(()) => tracing::info!("Logging initialized at level: {}", log_level),
        Err(e) => tracing::debug!("Logging already initialized: {}", e),
    }
}
