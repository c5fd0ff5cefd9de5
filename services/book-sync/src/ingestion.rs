//! Feed ingestion
//!
//! `FeedIngester` is the single inbound handler. It owns the registry and
//! the alert engine, decodes frames from the delta stream, routes events,
//! and evaluates alerts for every instrument an event touched.
//!
//! Transport failures are not swallowed: connection changes and snapshot
//! fetch failures are recorded here so readers can show staleness.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use types::ids::{InstrumentId, MarketId};

use crate::alerts::{AlertEngine, PriceAlert};
use crate::config::AlertConfig;
use crate::events::{decode_frame, FeedEvent};
use crate::registry::{BatchOutcome, EventOutcome, OrderBookRegistry, RegistryConfig, SeedOutcome};
use crate::snapshot::SnapshotResponse;

/// Errors that can occur during frame ingestion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestionError {
    #[error("undecodable frame: {0}")]
    Decode(String),
}

/// State of the delta-stream transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected { since: i64 },
    Disconnected { reason: String, since: i64 },
}

/// Most recent snapshot fetch failure for an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFailure {
    pub reason: String,
    pub failed_at: i64,
    /// Consecutive failures since the last successful fetch.
    pub attempts: u32,
}

/// What one frame did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub events: usize,
    pub snapshots: usize,
    pub deltas: BatchOutcome,
    pub trades: usize,
    /// Events that failed to apply; other events in the frame still apply.
    pub rejected_events: usize,
    pub alerts: Vec<PriceAlert>,
}

pub struct FeedIngester {
    registry: OrderBookRegistry,
    alerts: AlertEngine,
    connection: ConnectionState,
    snapshot_failures: BTreeMap<InstrumentId, SnapshotFailure>,
    frames_processed: u64,
    frames_rejected: u64,
}

impl FeedIngester {
    pub fn new(registry: OrderBookRegistry, alerts: AlertEngine) -> Self {
        info!(
            stale_after_ms = registry.config().stale_after_ms,
            pending_cap = registry.config().pending_cap,
            "FeedIngester initialized"
        );

        Self {
            registry,
            alerts,
            connection: ConnectionState::Connecting,
            snapshot_failures: BTreeMap::new(),
            frames_processed: 0,
            frames_rejected: 0,
        }
    }

    /// Create an ingester with default registry and alert configuration.
    pub fn with_defaults() -> Self {
        Self::new(
            OrderBookRegistry::new(RegistryConfig::default()),
            AlertEngine::new(AlertConfig::default()),
        )
    }

    /// Decode and apply one frame from the delta stream.
    ///
    /// An undecodable frame is rejected whole and leaves state untouched.
    pub fn handle_frame(&mut self, text: &str, now: i64) -> Result<IngestReport, IngestionError> {
        let events = match decode_frame(text) {
            Ok(events) => events,
            Err(err) => {
                self.frames_rejected += 1;
                warn!(error = %err, "Rejecting undecodable frame");
                return Err(IngestionError::Decode(err.to_string()));
            }
        };

        let mut report = IngestReport::default();
        for event in &events {
            self.handle_event(event, now, &mut report);
        }
        self.frames_processed += 1;
        Ok(report)
    }

    /// Apply one decoded event and evaluate alerts for what it touched.
    pub fn handle_event(&mut self, event: &FeedEvent, now: i64, report: &mut IngestReport) {
        report.events += 1;
        debug!(
            event_type = event.event_type_label(),
            provider_ts = ?event.timestamp_ms(),
            "Handling feed event"
        );

        match self.registry.apply_event(event, now) {
            Ok(EventOutcome::Snapshot(_)) => report.snapshots += 1,
            Ok(EventOutcome::Trade) => {
                // Trades never move the midpoint
                report.trades += 1;
                return;
            }
            Ok(EventOutcome::Deltas(batch)) => {
                report.deltas.applied += batch.applied;
                report.deltas.buffered += batch.buffered;
                report.deltas.dropped += batch.dropped;
                report.deltas.rejected += batch.rejected;
                if batch.applied == 0 {
                    return;
                }
            }
            Err(err) => {
                report.rejected_events += 1;
                warn!(
                    event_type = event.event_type_label(),
                    error = %err,
                    "Feed event rejected"
                );
                return;
            }
        }

        for raw_id in event.instrument_ids() {
            let Ok(instrument_id) = InstrumentId::try_new(raw_id) else {
                continue;
            };
            if let Some(alert) = self.alerts.evaluate(&self.registry, &instrument_id, now) {
                report.alerts.push(alert);
            }
        }
    }

    /// Install a response from the snapshot source.
    ///
    /// Clears any recorded snapshot failure for the instrument.
    pub fn handle_snapshot(
        &mut self,
        instrument_id: &InstrumentId,
        market_id: &MarketId,
        response: &SnapshotResponse,
        now: i64,
    ) -> (SeedOutcome, Option<PriceAlert>) {
        self.snapshot_failures.remove(instrument_id);
        let outcome = self.registry.seed_from_rest(instrument_id, market_id, response, now);
        let alert = match outcome {
            SeedOutcome::Applied(_) => self.alerts.evaluate(&self.registry, instrument_id, now),
            SeedOutcome::SkippedFresh => None,
        };
        (outcome, alert)
    }

    pub fn on_connecting(&mut self) {
        info!("Delta stream connecting");
        self.connection = ConnectionState::Connecting;
    }

    pub fn on_connected(&mut self, now: i64) {
        info!("Delta stream connected");
        self.connection = ConnectionState::Connected { since: now };
    }

    /// Record a stream disconnect. Book state is kept; it goes stale on its
    /// own clock.
    pub fn on_disconnected(&mut self, reason: impl Into<String>, now: i64) {
        let reason = reason.into();
        warn!(reason = %reason, "Delta stream disconnected");
        self.connection = ConnectionState::Disconnected { reason, since: now };
    }

    pub fn on_snapshot_failed(&mut self, instrument_id: &InstrumentId, reason: impl Into<String>, now: i64) {
        let reason = reason.into();
        let attempts = self
            .snapshot_failures
            .get(instrument_id)
            .map_or(1, |failure| failure.attempts.saturating_add(1));
        warn!(
            instrument = %instrument_id,
            reason = %reason,
            attempts,
            "Snapshot fetch failed"
        );
        self.snapshot_failures.insert(
            instrument_id.clone(),
            SnapshotFailure {
                reason,
                failed_at: now,
                attempts,
            },
        );
    }

    /// Release all per-instrument state.
    pub fn unsubscribe(&mut self, instrument_id: &InstrumentId) {
        self.registry.clear(instrument_id);
        self.alerts.clear(instrument_id);
        self.snapshot_failures.remove(instrument_id);
    }

    /// Whether readers should treat the instrument's view as out of date.
    pub fn is_degraded(&self, instrument_id: &InstrumentId, now: i64) -> bool {
        !matches!(self.connection, ConnectionState::Connected { .. })
            || self.snapshot_failures.contains_key(instrument_id)
            || self.registry.is_stale(instrument_id, now)
    }

    pub fn registry(&self) -> &OrderBookRegistry {
        &self.registry
    }

    pub fn alerts(&self) -> &AlertEngine {
        &self.alerts
    }

    pub fn alerts_mut(&mut self) -> &mut AlertEngine {
        &mut self.alerts
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn snapshot_failure(&self, instrument_id: &InstrumentId) -> Option<&SnapshotFailure> {
        self.snapshot_failures.get(instrument_id)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }

    /// Hand back the registry and alert engine.
    pub fn into_parts(self) -> (OrderBookRegistry, AlertEngine) {
        (self.registry, self.alerts)
    }
}
