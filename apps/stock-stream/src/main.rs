//! Stock Stream Demo Binary
//!
//! Runs stock handles against an in-memory transport driven by a synthetic
//! feed, logging what each stream receives.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin stock-stream
//! ```
//!
//! # Environment Variables
//!
//! - `STOCK_STREAM_SYMBOLS`: comma-separated symbols (default: AAPL,MSFT)
//! - `STOCK_STREAM_TICK_INTERVAL_MS`: synthetic tick interval (default: 250)
//! - `STOCK_STREAM_SNAPSHOT_DELAY_MS`: delay before feeds report loaded (default: 100)
//! - `STOCK_STREAM_CONNECT_DELAY_MS`: delay before the transport connects (default: 500)
//! - `STOCK_STREAM_RETRY_INITIAL_MS`: first load retry delay (default: 500)
//! - `STOCK_STREAM_RETRY_MAX_SECS`: maximum load retry delay (default: 10)
//! - `STOCK_STREAM_RETRY_MULTIPLIER`: load retry backoff multiplier (default: 2.0)
//! - `STOCK_STREAM_RETRY_MAX_ATTEMPTS`: load retries, 0 = unlimited (default: 0)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: stock-stream)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use stock_stream::infrastructure::telemetry;
use stock_stream::{
    AppConfig, FeedContext, FeedSettings, InMemoryTransport, PrometheusMetrics, RetryConfig,
    RetryError, RetryPolicy, StockBook, StockHandle, SyntheticFeed, init_metrics,
    load_with_retry, subscribe_channel,
};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting stock stream");

    let metrics_handle = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics recorder not installed");
            None
        }
    };

    let config = AppConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let mut tasks = JoinSet::new();
    let mut loads = JoinSet::new();

    // Transport starts disconnected; the connector brings it up.
    let transport = Arc::new(InMemoryTransport::new());
    transport.set_available(false);
    tasks.spawn(connect_transport(
        Arc::clone(&transport),
        config.feed.clone(),
        shutdown_token.clone(),
    ));

    let context = FeedContext::from_transport(&transport).with_metrics(Arc::new(PrometheusMetrics));
    let book = Arc::new(StockBook::new(context));
    for symbol in &config.feed.symbols {
        let handle = book.get_or_insert(symbol);
        attach_consumers(&handle, &shutdown_token, &mut tasks);

        let retry = RetryConfig::from(&config.retry);
        let shutdown = shutdown_token.clone();
        loads.spawn(async move {
            let mut policy = RetryPolicy::new(retry);
            match load_with_retry(&handle, &mut policy, &shutdown).await {
                Ok(attempts) => {
                    tracing::info!(symbol = %handle.symbol(), attempts, "Stock handle ready");
                }
                Err(RetryError::Cancelled) => {
                    tracing::debug!(symbol = %handle.symbol(), "Load abandoned at shutdown");
                }
                Err(e) => {
                    tracing::error!(
                        symbol = %handle.symbol(),
                        error = %e,
                        "Stock handle unavailable"
                    );
                }
            }
        });
    }

    let generator = SyntheticFeed::new(
        Arc::clone(&transport),
        &config.feed.symbols,
        config.feed.tick_interval,
    );
    let generator_task = tokio::spawn(generator.run(shutdown_token.clone()));

    tracing::info!(symbols = book.len(), "Stock stream ready");

    await_shutdown(&shutdown_token).await;

    // A load can still be inside the transport call; let it land before clearing.
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain(&mut loads))
        .await
        .is_err()
    {
        tracing::warn!(remaining = loads.len(), "Loads still running at shutdown");
        loads.abort_all();
    }
    book.clear_all();

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, generator_task).await {
        Ok(Ok(ticks)) => tracing::info!(ticks, "Generator stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "Generator task failed"),
        Err(_) => tracing::warn!("Generator did not stop in time"),
    }
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain(&mut tasks))
        .await
        .is_err()
    {
        tracing::warn!(remaining = tasks.len(), "Tasks still running at shutdown");
        tasks.abort_all();
    }

    for status in book.statuses() {
        match serde_json::to_string(&status) {
            Ok(json) => tracing::info!(status = %json, "Final handle status"),
            Err(e) => tracing::warn!(error = %e, "Status not serializable"),
        }
    }
    if let Some(handle) = metrics_handle {
        tracing::debug!(metrics = %handle.render(), "Final metrics");
    }

    tracing::info!("Stock stream stopped");
    Ok(())
}

/// Bring the transport up after the connect delay, then report every feed
/// loaded once the snapshot delay has passed.
async fn connect_transport(
    transport: Arc<InMemoryTransport>,
    settings: FeedSettings,
    shutdown: CancellationToken,
) {
    tokio::select! {
        () = shutdown.cancelled() => return,
        () = tokio::time::sleep(settings.connect_delay) => {}
    }

    let feeds: Vec<_> = settings
        .symbols
        .iter()
        .map(|symbol| transport.register_symbol(symbol))
        .collect();
    transport.set_available(true);
    tracing::info!(feeds = feeds.len(), "Transport connected");

    tokio::select! {
        () = shutdown.cancelled() => return,
        () = tokio::time::sleep(settings.snapshot_delay) => {}
    }

    for feed in feeds {
        transport.mark_loaded(feed);
    }
    tracing::info!("Initial snapshots received");
}

/// Subscribe the demo's consumers to a handle's streams.
fn attach_consumers(
    handle: &Arc<StockHandle>,
    shutdown: &CancellationToken,
    tasks: &mut JoinSet<()>,
) {
    let symbol = handle.symbol().clone();

    {
        let symbol = symbol.clone();
        handle.level1().subscribe(move |quote, _| {
            tracing::debug!(symbol = %symbol, bid = %quote["bid"], ask = %quote["ask"], "Quote");
        });
    }

    {
        let symbol = symbol.clone();
        handle.level2().subscribe(move |depth, _| {
            let levels = depth["bids"].as_array().map_or(0, Vec::len);
            tracing::trace!(symbol = %symbol, levels, "Depth update");
        });
    }

    {
        let symbol = symbol.clone();
        handle.account().subscribe(move |account, _| {
            tracing::info!(symbol = %symbol, position = %account["position"], "Account update");
        });
    }

    // Prints go through a channel to an async consumer.
    let (token, mut prints) = subscribe_channel(handle.prints());
    let handle = Arc::clone(handle);
    let shutdown = shutdown.clone();
    tasks.spawn(async move {
        let mut volume = 0u64;
        loop {
            let print = tokio::select! {
                () = shutdown.cancelled() => break,
                next = prints.recv() => match next {
                    Some(print) => print,
                    None => break,
                },
            };
            volume += print.payload["size"].as_u64().unwrap_or(0);
            let quote_bid = print
                .supplementary
                .as_ref()
                .map(|quote| quote["bid"].clone())
                .unwrap_or_default();
            tracing::info!(
                symbol = %print.symbol,
                price = %print.payload["price"],
                size = %print.payload["size"],
                quote_bid = %quote_bid,
                volume,
                "Print"
            );
        }
        handle.prints().unsubscribe(token);
        tracing::debug!(symbol = %symbol, volume, "Print consumer finished");
    });
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Task failed");
        }
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    let symbols: Vec<String> = config.feed.symbols.iter().map(ToString::to_string).collect();
    tracing::info!(
        symbols = %symbols.join(","),
        tick_interval_ms = u64::try_from(config.feed.tick_interval.as_millis()).unwrap_or(u64::MAX),
        retry_max_attempts = config.retry.max_attempts,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: &CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
