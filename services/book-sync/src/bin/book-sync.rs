use std::time::Duration;

use anyhow::Context;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing_subscriber::EnvFilter;

use book_sync::alerts::AlertEngine;
use book_sync::config::{AlertConfig, AlertConfigStore};
use book_sync::ingestion::FeedIngester;
use book_sync::notify::{LogSink, TerminalBell};
use book_sync::registry::{OrderBookRegistry, RegistryConfig};
use book_sync::replay::{compute_state_checksum, RecordedFrame};
use types::time::now_millis;

const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(version = book_sync::SERVICE_VERSION, "Starting book-sync");

    let mut alerts = match AlertConfigStore::from_env() {
        Some(store) => {
            let path = store.path().display().to_string();
            AlertEngine::with_store(store).with_context(|| format!("loading alert config from {}", path))?
        }
        None => AlertEngine::new(AlertConfig::default()),
    };
    alerts.add_sink(Box::new(LogSink));
    alerts.add_sink(Box::new(TerminalBell::stderr()));

    let mut ingester = FeedIngester::new(OrderBookRegistry::new(RegistryConfig::default()), alerts);

    let input: Box<dyn AsyncRead + Unpin> = match std::env::args().nth(1) {
        Some(path) => Box::new(
            File::open(&path)
                .await
                .with_context(|| format!("opening recording {}", path))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(input).lines();
    ingester.on_connected(now_millis());

    let mut ticker = tokio::time::interval(STALE_CHECK_INTERVAL);
    // Latest receive time seen; recordings carry their own clock.
    let mut clock = now_millis();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading input")? else {
                    break;
                };
                let Some(frame) = RecordedFrame::parse_line(&line, now_millis()) else {
                    continue;
                };
                clock = clock.max(frame.received_at);

                match ingester.handle_frame(&frame.payload, frame.received_at) {
                    Ok(report) => {
                        tracing::debug!(
                            events = report.events,
                            applied = report.deltas.applied,
                            buffered = report.deltas.buffered,
                            alerts = report.alerts.len(),
                            "Frame applied"
                        );
                    }
                    Err(err) => tracing::warn!(error = %err, "Frame rejected"),
                }
            }
            _ = ticker.tick() => {
                let stale = ingester.registry().stale_instruments(clock);
                if !stale.is_empty() {
                    let ids: Vec<&str> = stale.iter().map(|id| id.as_str()).collect();
                    tracing::warn!(count = stale.len(), instruments = ?ids, "Stale books");
                }
            }
        }
    }

    ingester.on_disconnected("input closed", clock);

    let registry = ingester.registry();
    let stats = registry.stats();
    tracing::info!(
        books = registry.book_count(),
        frames = ingester.frames_processed(),
        frames_rejected = ingester.frames_rejected(),
        snapshots = stats.snapshots_applied,
        deltas_applied = stats.deltas_applied,
        deltas_buffered = stats.deltas_buffered,
        deltas_dropped = stats.deltas_dropped,
        malformed_fields = stats.malformed_fields,
        alerts = ingester.alerts().alert_count(),
        unseen_alerts = ingester.alerts().unseen_count(),
        state_checksum = %compute_state_checksum(registry),
        "Input exhausted"
    );

    Ok(())
}
