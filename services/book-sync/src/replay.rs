//! Replay of recorded feed sessions
//!
//! Feeds recorded frames into a fresh ingester in receive order and
//! checksums the resulting book state. Same frames in, same checksum out:
//! the engine only ever reads time from the recording.

use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::alerts::{AlertEngine, PriceAlert};
use crate::config::AlertConfig;
use crate::ingestion::FeedIngester;
use crate::registry::{OrderBookRegistry, RegistryConfig};
use crate::snapshot::hash_levels;

/// One frame as captured off the delta stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFrame {
    /// Local receive time (Unix millis).
    pub received_at: i64,
    /// Raw frame text.
    pub payload: String,
}

impl RecordedFrame {
    pub fn new(received_at: i64, payload: impl Into<String>) -> Self {
        Self {
            received_at,
            payload: payload.into(),
        }
    }

    /// Parse one recording line.
    ///
    /// Accepts `<receive_ms>\t<json>`, or bare JSON which is stamped with
    /// `default_received_at`. Blank lines yield `None`.
    pub fn parse_line(line: &str, default_received_at: i64) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some((stamp, payload)) = line.split_once('\t') {
            if let Ok(received_at) = stamp.trim().parse::<i64>() {
                return Some(Self::new(received_at, payload.trim()));
            }
        }
        Some(Self::new(default_received_at, line))
    }
}

/// Metrics collected during replay.
#[derive(Debug, Clone)]
pub struct ReplayMetrics {
    pub frames_replayed: u64,
    /// Frames that failed to decode (relaxed mode only).
    pub frames_rejected: u64,
    pub events_applied: u64,
    pub alerts_raised: u64,
    /// Duration of replay in milliseconds.
    pub duration_ms: u128,
    pub frames_per_second: f64,
    /// State checksum after replay.
    pub state_checksum: String,
}

/// Result of a replay operation.
#[derive(Debug)]
pub struct ReplayResult {
    pub registry: OrderBookRegistry,
    pub alerts: Vec<PriceAlert>,
    pub metrics: ReplayMetrics,
}

/// Errors during replay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("frame {index} received at {received_at} precedes previous frame at {previous}")]
    OutOfOrder {
        index: usize,
        received_at: i64,
        previous: i64,
    },

    #[error("frame {index} could not be decoded: {reason}")]
    UndecodableFrame { index: usize, reason: String },

    #[error("state checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

/// Replays recorded frames to rebuild registry state.
pub struct ReplayEngine {
    registry_config: RegistryConfig,
    alert_config: AlertConfig,
    /// Expected state checksum for validation (if known).
    expected_checksum: Option<String>,
    /// Reject receive times going backwards, and undecodable frames.
    strict_ordering: bool,
}

impl ReplayEngine {
    pub fn new() -> Self {
        Self {
            registry_config: RegistryConfig::default(),
            alert_config: AlertConfig::default(),
            expected_checksum: None,
            strict_ordering: true,
        }
    }

    pub fn with_registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    pub fn with_alert_config(mut self, config: AlertConfig) -> Self {
        self.alert_config = config;
        self
    }

    /// Set the expected state checksum for post-replay validation.
    pub fn with_expected_checksum(mut self, checksum: String) -> Self {
        self.expected_checksum = Some(checksum);
        self
    }

    /// Skip bad frames and tolerate receive-time regressions.
    pub fn with_relaxed_ordering(mut self) -> Self {
        self.strict_ordering = false;
        self
    }

    /// Replay frames in order and rebuild all state.
    pub fn replay(&self, frames: &[RecordedFrame]) -> Result<ReplayResult, ReplayError> {
        let start = Instant::now();
        info!(frame_count = frames.len(), "Starting frame replay");

        let mut ingester = FeedIngester::new(
            OrderBookRegistry::new(self.registry_config),
            AlertEngine::new(self.alert_config.clone()),
        );
        ingester.on_connected(frames.first().map_or(0, |frame| frame.received_at));

        let mut previous: Option<i64> = None;
        let mut frames_replayed: u64 = 0;
        let mut frames_rejected: u64 = 0;
        let mut events_applied: u64 = 0;
        let mut alerts = Vec::new();

        for (index, frame) in frames.iter().enumerate() {
            if self.strict_ordering {
                if let Some(previous) = previous {
                    if frame.received_at < previous {
                        return Err(ReplayError::OutOfOrder {
                            index,
                            received_at: frame.received_at,
                            previous,
                        });
                    }
                }
            }

            match ingester.handle_frame(&frame.payload, frame.received_at) {
                Ok(report) => {
                    events_applied += report.events as u64;
                    alerts.extend(report.alerts);
                }
                Err(err) if self.strict_ordering => {
                    return Err(ReplayError::UndecodableFrame {
                        index,
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    frames_rejected += 1;
                    warn!(index, error = %err, "Skipping undecodable frame");
                }
            }

            previous = Some(frame.received_at);
            frames_replayed += 1;
        }

        let (registry, _) = ingester.into_parts();
        let state_checksum = compute_state_checksum(&registry);

        if let Some(ref expected) = self.expected_checksum {
            if &state_checksum != expected {
                error!(
                    expected = %expected,
                    actual = %state_checksum,
                    "State checksum mismatch after replay"
                );
                return Err(ReplayError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: state_checksum,
                });
            }
        }

        let duration_ms = start.elapsed().as_millis();
        let frames_per_second = if duration_ms > 0 {
            (frames_replayed as f64 / duration_ms as f64) * 1000.0
        } else {
            frames_replayed as f64
        };

        let metrics = ReplayMetrics {
            frames_replayed,
            frames_rejected,
            events_applied,
            alerts_raised: alerts.len() as u64,
            duration_ms,
            frames_per_second,
            state_checksum,
        };

        info!(
            frames_replayed = metrics.frames_replayed,
            frames_rejected = metrics.frames_rejected,
            alerts_raised = metrics.alerts_raised,
            duration_ms = metrics.duration_ms,
            "Replay completed successfully"
        );

        Ok(ReplayResult {
            registry,
            alerts,
            metrics,
        })
    }
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute a checksum over every book in the registry.
///
/// Covers instrument ids, levels and best prices. Receive times and
/// provider hashes are left out so the value depends on book content only.
pub fn compute_state_checksum(registry: &OrderBookRegistry) -> String {
    let mut hasher = Sha256::new();

    for instrument_id in registry.instruments() {
        let Some(book) = registry.get_book(instrument_id) else {
            continue;
        };
        hasher.update(instrument_id.as_str().as_bytes());
        hasher.update(b"|");

        hash_levels(&mut hasher, book.bids(), book.asks());

        for best in [book.best_bid, book.best_ask] {
            if let Some(price) = best {
                hasher.update(price.as_decimal().normalize().to_string().as_bytes());
            }
            hasher.update(b";");
        }
        hasher.update(b"===");
    }

    format!("{:x}", hasher.finalize())
}
