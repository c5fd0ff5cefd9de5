//! Price history window
//!
//! Bounded time series of top-of-book observations for one instrument,
//! kept in timestamp order. Both bounds (max age, max count) are enforced on
//! every insert, oldest first.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::numeric::Price;

/// One observation of the top of book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub midpoint: Decimal,
    /// Unix millis.
    pub timestamp: i64,
}

/// Retention limits for a history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    pub max_age_ms: i64,
    pub max_entries: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_age_ms: 120_000,
            max_entries: 1_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriceHistory {
    limits: HistoryLimits,
    entries: VecDeque<PriceHistoryEntry>,
}

impl PriceHistory {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            limits,
            entries: VecDeque::new(),
        }
    }

    /// Insert an observation, then evict by age and by count.
    pub fn record(&mut self, entry: PriceHistoryEntry) {
        // Late arrivals are slotted in, not appended, to keep the series sorted.
        let index = self
            .entries
            .partition_point(|existing| existing.timestamp <= entry.timestamp);
        self.entries.insert(index, entry);

        if let Some(newest) = self.entries.back().map(|e| e.timestamp) {
            let cutoff = newest.saturating_sub(self.limits.max_age_ms);
            while self.entries.front().is_some_and(|e| e.timestamp < cutoff) {
                self.entries.pop_front();
            }
        }

        while self.entries.len() > self.limits.max_entries {
            self.entries.pop_front();
        }
    }

    /// Midpoint at time `t`.
    ///
    /// Linearly interpolated between the entries bracketing `t`. When `t`
    /// lies outside the series the nearest entry is used as-is. `None` only
    /// when the series is empty.
    pub fn price_at(&self, t: i64) -> Option<Decimal> {
        let split = self.entries.partition_point(|e| e.timestamp <= t);
        let before = split.checked_sub(1).and_then(|i| self.entries.get(i));
        let after = self.entries.get(split);

        match (before, after) {
            (Some(before), Some(after)) => Some(interpolate(before, after, t)),
            (Some(only), None) | (None, Some(only)) => Some(only.midpoint),
            (None, None) => None,
        }
    }

    pub fn latest(&self) -> Option<&PriceHistoryEntry> {
        self.entries.back()
    }

    pub fn oldest(&self) -> Option<&PriceHistoryEntry> {
        self.entries.front()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PriceHistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn interpolate(before: &PriceHistoryEntry, after: &PriceHistoryEntry, t: i64) -> Decimal {
    let span = after.timestamp - before.timestamp;
    if span <= 0 {
        return before.midpoint;
    }

    let fraction = Decimal::from(t - before.timestamp).checked_div(Decimal::from(span));
    let delta = after.midpoint - before.midpoint;

    match fraction.and_then(|f| delta.checked_mul(f)) {
        Some(step) => before.midpoint + step,
        None => before.midpoint,
    }
}
