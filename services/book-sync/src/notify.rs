//! Notification sinks
//!
//! Side-effect outlets for raised alerts. Delivery is best effort: the
//! alert engine logs a failing sink and moves on.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::alerts::PriceAlert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    /// Audio cue.
    Sound,
    /// Platform notification facility.
    Platform,
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// An outlet for raised alerts
pub trait NotificationSink {
    /// Channel this sink delivers on; gated by the alert config toggles.
    fn channel(&self) -> NotificationChannel;

    fn deliver(&mut self, alert: &PriceAlert) -> Result<(), SinkError>;
}

/// Platform notifications rendered as structured log lines.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Platform
    }

    fn deliver(&mut self, alert: &PriceAlert) -> Result<(), SinkError> {
        info!(
            alert_id = %alert.id,
            alert_type = ?alert.alert_type,
            instrument = %alert.instrument_id,
            magnitude = %alert.magnitude,
            current_price = %alert.current_price,
            previous_price = %alert.previous_price,
            "Price alert"
        );
        Ok(())
    }
}

/// Audio cue: rings the terminal bell on the given writer.
#[derive(Debug)]
pub struct TerminalBell<W: Write> {
    out: W,
}

impl<W: Write> TerminalBell<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl TerminalBell<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> NotificationSink for TerminalBell<W> {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Sound
    }

    fn deliver(&mut self, _alert: &PriceAlert) -> Result<(), SinkError> {
        self.out.write_all(b"\x07")?;
        self.out.flush()?;
        Ok(())
    }
}
