use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use market_data_pipeline::app::{logging, AppConfig};
use market_data_pipeline::feeds::{FeedSettings, FeedSimulator};
use market_data_pipeline::pipeline::{MarketDataPipeline, PipelineEvent};
use market_data_pipeline::strategy::{
    ConstantDecisionEngine, CooldownEngine, DecisionEngine, Signal, DEFAULT_MIN_CONFIDENCE,
};

const TRADE_COOLDOWN: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    logging::init_logging(&config.log_level);

    info!("🚀 Market data pipeline starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Feeds: {}", config.feed_sources.join(", "));

    let pipeline = Arc::new(MarketDataPipeline::new(config.pipeline.clone())?);

    pipeline.on_market_data(|update| {
        debug!(
            "📈 {} price {:.2} vol {:.2} (conf {:.2})",
            update.source, update.price, update.volume, update.confidence
        );
    });
    pipeline.on_order_book(|update| {
        debug!(
            "📚 {} book bid {:?} / ask {:?}",
            update.source,
            update.book.best_bid(),
            update.book.best_ask()
        );
    });
    pipeline.on_sentiment(|source, score| {
        debug!("💬 {} sentiment {:+.3}", source, score);
    });

    pipeline.start()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feeds: Vec<_> = config
        .feed_sources
        .iter()
        .map(|source| {
            let settings = FeedSettings::new(source.clone()).with_tick(config.feed_tick);
            tokio::spawn(FeedSimulator::new(settings).run(pipeline.clone(), shutdown_rx.clone()))
        })
        .collect();

    let events = tokio::spawn(log_events(pipeline.subscribe_events()));
    let reporter = tokio::spawn(report_loop(
        pipeline.clone(),
        config.report_interval,
        shutdown_rx.clone(),
    ));

    wait_for_shutdown(config.run_for).await;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    for feed in feeds {
        if let Err(e) = feed.await {
            warn!("Feed task ended abnormally: {}", e);
        }
    }
    if let Err(e) = reporter.await {
        warn!("Reporter task ended abnormally: {}", e);
    }

    pipeline.stop();
    events.abort();

    info!("{}", pipeline.generate_summary_report());
    debug!("Final metrics:\n{}", pipeline.metrics().render());
    info!("👋 Market data pipeline shut down");

    Ok(())
}

async fn wait_for_shutdown(run_for: Duration) {
    if run_for.is_zero() {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        return;
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        }
        _ = tokio::time::sleep(run_for) => {
            info!("Run time of {:?} elapsed", run_for);
        }
    }
}

async fn log_events(mut events: broadcast::Receiver<PipelineEvent>) {
    loop {
        match events.recv().await {
            Ok(PipelineEvent::SampleRejected {
                source,
                stream,
                reason,
                ..
            }) => {
                debug!("Rejected {} sample from {}: {}", stream, source, reason);
            }
            Ok(PipelineEvent::QueueOverflow { stream, capacity }) => {
                warn!("🚨 {} queue overflow at capacity {}", stream, capacity);
            }
            Ok(PipelineEvent::CallbackFault { stream, message }) => {
                error!("🚨 {} callback fault: {}", stream, message);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event log lagged, {} events skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn report_loop(
    pipeline: Arc<MarketDataPipeline>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let engine: Box<dyn DecisionEngine> = Box::new(CooldownEngine::new(
        ConstantDecisionEngine::default(),
        TRADE_COOLDOWN,
    ));
    let mut interval = tokio::time::interval(every);
    // The first tick completes immediately; nothing has been processed yet.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let features = pipeline.latest_features();
                let signal = Signal::from_decision(engine.decide(&features), DEFAULT_MIN_CONFIDENCE);
                info!(
                    "🤖 Decision: {} (confidence {:.2}, execute: {})",
                    signal.action, signal.confidence, signal.should_execute
                );

                if let Some(latest) = pipeline.latest_market_data() {
                    info!(
                        "💹 Last {} price {:.2} | RSI {:.1} | aggregate sentiment {:+.3} | {:.1} samples/s",
                        latest.source,
                        latest.price,
                        pipeline.indicator_value("RSI").unwrap_or_default(),
                        pipeline.aggregate_sentiment(),
                        pipeline.metrics().get_sample_rate()
                    );
                }

                info!("{}", pipeline.generate_summary_report());
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
