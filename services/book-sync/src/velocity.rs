//! Price velocity
//!
//! Percentage change of the midpoint over fixed trailing windows, derived
//! from an instrument's price history. Nothing here is stored
//! authoritatively: the registry recomputes it after every history insert.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::history::PriceHistory;

/// Trailing windows velocity is measured over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VelocityWindow {
    #[serde(rename = "1s")]
    OneSecond,
    #[serde(rename = "5s")]
    FiveSeconds,
    #[serde(rename = "30s")]
    ThirtySeconds,
    #[serde(rename = "60s")]
    SixtySeconds,
}

impl VelocityWindow {
    /// Get the window length in milliseconds
    pub fn duration_ms(&self) -> i64 {
        match self {
            VelocityWindow::OneSecond => 1_000,
            VelocityWindow::FiveSeconds => 5_000,
            VelocityWindow::ThirtySeconds => 30_000,
            VelocityWindow::SixtySeconds => 60_000,
        }
    }

    /// All windows
    pub fn all() -> &'static [VelocityWindow] {
        &[
            VelocityWindow::OneSecond,
            VelocityWindow::FiveSeconds,
            VelocityWindow::ThirtySeconds,
            VelocityWindow::SixtySeconds,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriceDirection {
    Up,
    Down,
    Stable,
}

/// Velocity tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityConfig {
    /// Anomaly when `|change_5s|` exceeds this fraction.
    pub anomaly_threshold_5s: Decimal,
    /// Anomaly when `|change_1s|` exceeds this fraction.
    pub anomaly_threshold_1s: Decimal,
    /// `change_5s` within `±dead_zone` is `Stable`.
    pub direction_dead_zone: Decimal,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold_5s: Decimal::new(5, 2),
            anomaly_threshold_1s: Decimal::new(10, 2),
            direction_dead_zone: Decimal::new(1, 2),
        }
    }
}

/// Windowed midpoint changes for one instrument.
///
/// Changes are fractions: `-0.12` is a 12% drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceVelocity {
    pub change_1s: Decimal,
    pub change_5s: Decimal,
    pub change_30s: Decimal,
    pub change_60s: Decimal,
    pub is_anomaly: bool,
    pub direction: PriceDirection,
    pub calculated_at: i64,
}

impl PriceVelocity {
    /// Change over one window.
    pub fn change(&self, window: VelocityWindow) -> Decimal {
        match window {
            VelocityWindow::OneSecond => self.change_1s,
            VelocityWindow::FiveSeconds => self.change_5s,
            VelocityWindow::ThirtySeconds => self.change_30s,
            VelocityWindow::SixtySeconds => self.change_60s,
        }
    }
}

/// `(current - past) / past`, zero when `past` is zero.
pub fn percent_change(current: Decimal, past: Decimal) -> Decimal {
    if past.is_zero() {
        return Decimal::ZERO;
    }
    (current - past).checked_div(past).unwrap_or(Decimal::ZERO)
}

/// Compute velocity as of `now`.
///
/// The current price is the newest midpoint in the history; the past price
/// for each window is the interpolated midpoint at `now - window`. Returns
/// `None` for an empty history.
pub fn calculate(history: &PriceHistory, now: i64, config: &VelocityConfig) -> Option<PriceVelocity> {
    let current = history.latest()?.midpoint;

    let change_over = |window: VelocityWindow| {
        history
            .price_at(now - window.duration_ms())
            .map_or(Decimal::ZERO, |past| percent_change(current, past))
    };

    let change_1s = change_over(VelocityWindow::OneSecond);
    let change_5s = change_over(VelocityWindow::FiveSeconds);
    let change_30s = change_over(VelocityWindow::ThirtySeconds);
    let change_60s = change_over(VelocityWindow::SixtySeconds);

    let is_anomaly =
        change_5s.abs() > config.anomaly_threshold_5s || change_1s.abs() > config.anomaly_threshold_1s;

    let direction = if change_5s > config.direction_dead_zone {
        PriceDirection::Up
    } else if change_5s < -config.direction_dead_zone {
        PriceDirection::Down
    } else {
        PriceDirection::Stable
    };

    Some(PriceVelocity {
        change_1s,
        change_5s,
        change_30s,
        change_60s,
        is_anomaly,
        direction,
        calculated_at: now,
    })
}
