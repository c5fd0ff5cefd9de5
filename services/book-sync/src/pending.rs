//! Pending-delta buffer
//!
//! Deltas that arrive for an instrument with no book yet are parked here
//! until a snapshot lands. Each queue is capped; once full, further deltas
//! for that instrument are dropped rather than queued.
//!
//! Replay order is local receipt order. Every push is stamped with a
//! buffer-wide sequence number so that deltas received in the same
//! millisecond keep the order they were observed in.

use std::collections::BTreeMap;

use tracing::warn;
use types::ids::InstrumentId;

use crate::delta::PriceChange;

/// A delta waiting for its instrument's snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub change: PriceChange,
    /// Local receipt time (Unix millis).
    pub received_at: i64,
    /// Buffer-wide receipt sequence.
    pub receipt_seq: u64,
}

/// Result of offering a delta to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOutcome {
    /// Queued; `queued` is the queue length after the push.
    Buffered { queued: usize },
    /// Queue already at `cap`; the delta was discarded.
    Dropped { cap: usize },
}

/// Per-instrument bounded queues of pending deltas.
#[derive(Debug, Clone)]
pub struct PendingBuffer {
    cap: usize,
    next_seq: u64,
    queues: BTreeMap<InstrumentId, Vec<PendingChange>>,
}

impl PendingBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            next_seq: 0,
            queues: BTreeMap::new(),
        }
    }

    /// Queue a delta under its instrument.
    pub fn push(&mut self, change: PriceChange, received_at: i64) -> BufferOutcome {
        let queue = self.queues.entry(change.instrument_id.clone()).or_default();

        if queue.len() >= self.cap {
            warn!(
                instrument = %change.instrument_id,
                cap = self.cap,
                "Pending queue full, dropping delta"
            );
            return BufferOutcome::Dropped { cap: self.cap };
        }

        let receipt_seq = self.next_seq;
        self.next_seq += 1;
        queue.push(PendingChange {
            change,
            received_at,
            receipt_seq,
        });

        BufferOutcome::Buffered {
            queued: queue.len(),
        }
    }

    /// Remove and return an instrument's queue in receipt order.
    pub fn take(&mut self, instrument: &InstrumentId) -> Vec<PendingChange> {
        let mut entries = self.queues.remove(instrument).unwrap_or_default();
        entries.sort_by_key(|entry| (entry.received_at, entry.receipt_seq));
        entries
    }

    /// Number of deltas queued for an instrument.
    pub fn len(&self, instrument: &InstrumentId) -> usize {
        self.queues.get(instrument).map_or(0, Vec::len)
    }

    /// Number of deltas queued across all instruments.
    pub fn total_len(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(Vec::is_empty)
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Instruments with at least one queued delta.
    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.queues
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(id, _)| id)
    }

    pub fn clear(&mut self, instrument: &InstrumentId) {
        self.queues.remove(instrument);
    }

    pub fn clear_all(&mut self) {
        self.queues.clear();
    }
}
